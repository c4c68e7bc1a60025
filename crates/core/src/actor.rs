//! Actors: the people who hold and access records.
//!
//! An actor is an account with a unique email, a bcrypt password digest,
//! and a role-specific profile. The profile is a tagged union keyed by
//! role, so a doctor without a licence number or a patient carrying a badge
//! number is unrepresentable.
//!
//! Actors are never hard-deleted; deactivation flips `is_active` and leaves
//! the document (and every audit entry referencing it) in place.

use chrono::{DateTime, NaiveDate, Utc};
use mera_types::{EmailAddress, NonEmptyText};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The four account roles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Patient,
    Doctor,
    #[serde(rename = "emergency")]
    EmergencyResponder,
    Admin,
}

impl Role {
    /// Wire/storage spelling of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Patient => "patient",
            Role::Doctor => "doctor",
            Role::EmergencyResponder => "emergency",
            Role::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = crate::CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "patient" => Ok(Role::Patient),
            "doctor" => Ok(Role::Doctor),
            "emergency" => Ok(Role::EmergencyResponder),
            "admin" => Ok(Role::Admin),
            other => Err(crate::CoreError::InvalidInput(format!(
                "unknown role: '{other}'"
            ))),
        }
    }
}

/// Who to call when a patient cannot speak for themselves.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyContact {
    pub name: NonEmptyText,
    pub phone: NonEmptyText,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship: Option<NonEmptyText>,
}

/// Role-specific profile data, tagged by role.
///
/// `verified` starts false for doctors and emergency responders; only the
/// operator CLI flips it. Patients and admins have no verification flag.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum RoleProfile {
    Patient {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        date_of_birth: Option<NaiveDate>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        address: Option<NonEmptyText>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        emergency_contact: Option<EmergencyContact>,
    },
    Doctor {
        license_number: NonEmptyText,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        specialization: Option<NonEmptyText>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        hospital: Option<NonEmptyText>,
        #[serde(default)]
        verified: bool,
    },
    #[serde(rename = "emergency")]
    EmergencyResponder {
        badge_number: NonEmptyText,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        department: Option<NonEmptyText>,
        #[serde(default)]
        verified: bool,
    },
    Admin,
}

impl RoleProfile {
    /// The role this profile belongs to.
    pub fn role(&self) -> Role {
        match self {
            RoleProfile::Patient { .. } => Role::Patient,
            RoleProfile::Doctor { .. } => Role::Doctor,
            RoleProfile::EmergencyResponder { .. } => Role::EmergencyResponder,
            RoleProfile::Admin => Role::Admin,
        }
    }

    /// Forces the verification flag to false where one exists.
    ///
    /// Registration always starts professionals unverified, whatever the
    /// caller supplied.
    pub(crate) fn reset_verification(&mut self) {
        match self {
            RoleProfile::Doctor { verified, .. }
            | RoleProfile::EmergencyResponder { verified, .. } => *verified = false,
            RoleProfile::Patient { .. } | RoleProfile::Admin => {}
        }
    }

    /// Sets the verification flag.
    ///
    /// Returns false when the role has no verification flag.
    pub(crate) fn set_verified(&mut self, value: bool) -> bool {
        match self {
            RoleProfile::Doctor { verified, .. }
            | RoleProfile::EmergencyResponder { verified, .. } => {
                *verified = value;
                true
            }
            RoleProfile::Patient { .. } | RoleProfile::Admin => false,
        }
    }
}

/// A registered account.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub email: EmailAddress,
    /// bcrypt digest; never exposed through the API layer.
    pub password_digest: String,
    pub first_name: NonEmptyText,
    pub last_name: NonEmptyText,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<NonEmptyText>,
    #[serde(flatten)]
    pub profile: RoleProfile,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login: Option<DateTime<Utc>>,
}

impl Actor {
    pub fn role(&self) -> Role {
        self.profile.role()
    }

    /// The contact-essentials subset disclosed on the emergency path.
    ///
    /// Returns `None` for non-patient actors: emergency access only ever
    /// targets patients.
    pub fn emergency_profile(&self) -> Option<EmergencyPatientProfile> {
        let RoleProfile::Patient {
            date_of_birth,
            address,
            emergency_contact,
        } = &self.profile
        else {
            return None;
        };

        Some(EmergencyPatientProfile {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            date_of_birth: *date_of_birth,
            phone: self.phone.clone(),
            address: address.clone(),
            emergency_contact: emergency_contact.clone(),
        })
    }
}

/// Patient contact essentials disclosed to an emergency responder.
///
/// Deliberately excludes email, account state, and everything clinical;
/// record content flows through the separate emergency record projection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmergencyPatientProfile {
    pub first_name: NonEmptyText,
    pub last_name: NonEmptyText,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<NonEmptyText>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<NonEmptyText>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emergency_contact: Option<EmergencyContact>,
}

/// Input to registration: everything an [`Actor`] needs except what the
/// identity service derives (id, digest, timestamps, active flag).
#[derive(Clone, Debug)]
pub struct NewActor {
    pub email: EmailAddress,
    pub password: String,
    pub first_name: NonEmptyText,
    pub last_name: NonEmptyText,
    pub phone: Option<NonEmptyText>,
    pub profile: RoleProfile,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doctor_profile() -> RoleProfile {
        RoleProfile::Doctor {
            license_number: NonEmptyText::new("GMC-1234567").unwrap(),
            specialization: Some(NonEmptyText::new("Cardiology").unwrap()),
            hospital: None,
            verified: true,
        }
    }

    #[test]
    fn test_profile_reports_its_role() {
        assert_eq!(doctor_profile().role(), Role::Doctor);
        assert_eq!(RoleProfile::Admin.role(), Role::Admin);
    }

    #[test]
    fn test_reset_verification_clears_professional_flags() {
        let mut profile = doctor_profile();
        profile.reset_verification();
        assert!(matches!(
            profile,
            RoleProfile::Doctor {
                verified: false,
                ..
            }
        ));
    }

    #[test]
    fn test_set_verified_refuses_roles_without_flag() {
        let mut profile = RoleProfile::Patient {
            date_of_birth: None,
            address: None,
            emergency_contact: None,
        };
        assert!(!profile.set_verified(true));

        let mut doctor = doctor_profile();
        assert!(doctor.set_verified(false));
    }

    #[test]
    fn test_role_serialises_with_original_spellings() {
        assert_eq!(
            serde_json::to_string(&Role::EmergencyResponder).unwrap(),
            "\"emergency\""
        );
        assert_eq!(serde_json::to_string(&Role::Patient).unwrap(), "\"patient\"");
    }

    #[test]
    fn test_profile_tagged_serialisation_round_trip() {
        let profile = RoleProfile::EmergencyResponder {
            badge_number: NonEmptyText::new("BADGE-99").unwrap(),
            department: None,
            verified: false,
        };
        let json = serde_json::to_string(&profile).unwrap();
        assert!(json.contains("\"role\":\"emergency\""), "json: {json}");

        let back: RoleProfile = serde_json::from_str(&json).unwrap();
        assert_eq!(back, profile);
    }

    #[test]
    fn test_emergency_profile_only_for_patients() {
        let patient = Actor {
            id: Uuid::new_v4(),
            email: EmailAddress::new("p@example.com").unwrap(),
            password_digest: "digest".into(),
            first_name: NonEmptyText::new("Ada").unwrap(),
            last_name: NonEmptyText::new("Lovelace").unwrap(),
            phone: None,
            profile: RoleProfile::Patient {
                date_of_birth: None,
                address: None,
                emergency_contact: None,
            },
            is_active: true,
            created_at: Utc::now(),
            last_login: None,
        };
        assert!(patient.emergency_profile().is_some());

        let doctor = Actor {
            profile: doctor_profile(),
            email: EmailAddress::new("d@example.com").unwrap(),
            ..patient
        };
        assert!(doctor.emergency_profile().is_none());
    }
}
