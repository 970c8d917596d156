// Service exports
pub mod delivery;
pub mod directory;
pub mod geocode;
pub mod media;
pub mod scoring;
pub mod store;

pub use delivery::{BotChannel, Delivery, DeliveryError, DisplayHandle};
pub use directory::{DirectoryClient, DirectoryError, ProfileDirectory};
pub use geocode::{GeocodeError, Geocoder, NominatimClient};
pub use media::{MediaClient, MediaError, ObjectStore};
pub use scoring::{RatingClient, ScoringError, ScoringService};
pub use store::{MemoryStore, RedisStore, SessionStore, StoreError, StoreKey};
