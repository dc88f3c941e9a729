use serde::{Deserialize, Serialize};

/// Latitude/longitude pair as the auth backend expects it.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Postal address captured at registration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAddress {
    pub street: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub postal_code: String,
    pub coordinates: Coordinates,
}

/// The registered grower. Persisted under the `user` key, same JSON shape
/// as the registration request body plus the verification flag.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub name: String,
    pub phone_number: String,
    pub location: UserAddress,
    #[serde(default)]
    pub is_verified: bool,
}
