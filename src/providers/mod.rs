mod hubspot;
mod traits;

pub use hubspot::HubSpotRefresher;
pub use traits::{TokenRefresher, TokenSet};
