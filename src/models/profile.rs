use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: String,
    pub api_id: String,
    pub api_key: String,
    pub balance: i64,
}

/// What a caller may see about their own profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileView {
    pub user_id: String,
    pub api_id: String,
    pub balance: i64,
}

impl From<Profile> for ProfileView {
    fn from(profile: Profile) -> Self {
        Self {
            user_id: profile.user_id,
            api_id: profile.api_id,
            balance: profile.balance,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    pub api_id: String,
    pub api_key: String,
}

impl Credentials {
    pub fn generate() -> Self {
        let api_id = Uuid::new_v4().simple().to_string();
        let api_key = format!(
            "{}{}",
            Uuid::new_v4().simple(),
            Uuid::new_v4().simple()
        );

        Self {
            api_id: format!("qg_{}", &api_id[..16]),
            api_key,
        }
    }
}
