use serde::{Deserialize, Serialize};

/// Access level. Stored values vary in case and separator
/// (`"super_admin"`, `"Super Admin"`, `"SUPER-ADMIN"`); parsing normalizes
/// all of them to one variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
    SuperAdmin,
    Admin,
    Manager,
    #[default]
    User,
    TeamMember,
}

impl Role {
    pub fn from_str_lossy(s: &str) -> Self {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "superadmin" => Self::SuperAdmin,
            "admin" => Self::Admin,
            "manager" => Self::Manager,
            "teammember" => Self::TeamMember,
            _ => Self::User,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SuperAdmin => "super_admin",
            Self::Admin => "admin",
            Self::Manager => "manager",
            Self::User => "user",
            Self::TeamMember => "team_member",
        }
    }

    pub fn is_admin(self) -> bool {
        matches!(self, Self::SuperAdmin | Self::Admin)
    }
}

impl Serialize for Role {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from_str_lossy(&s))
    }
}

/// Team a user belongs to. Drives which progress rules apply: media buyers
/// are scored per task (copy), creative departments per slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Department {
    MediaBuying,
    VideoEditing,
    GraphicDesign,
    #[default]
    Dev,
}

impl Department {
    pub fn from_str_lossy(s: &str) -> Self {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "mediabuying" => Self::MediaBuying,
            "videoediting" => Self::VideoEditing,
            "graphicdesign" => Self::GraphicDesign,
            _ => Self::Dev,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::MediaBuying => "MEDIA BUYING",
            Self::VideoEditing => "VIDEO EDITING",
            Self::GraphicDesign => "GRAPHIC DESIGN",
            Self::Dev => "DEV",
        }
    }
}

impl Serialize for Department {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Department {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from_str_lossy(&s))
    }
}

/// User domain model - a team member in the external directory.
///
/// The password is opaque and compared verbatim; this system does no
/// hashing (small trusted internal team, directory owns the data).
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub department: Department,
    pub password: String,
    pub avatar: Option<String>,
    pub status: Option<String>,
}

impl User {
    /// Copy safe to echo back to clients: the stored password is blanked.
    pub fn sanitized(&self) -> User {
        User {
            password: String::new(),
            ..self.clone()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginPayload {
    pub email: String,
    pub password: String,
}
