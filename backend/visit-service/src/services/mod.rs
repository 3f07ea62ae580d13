/// Business logic layer for visit-service
pub mod favorites;
pub mod feed;
pub mod publish;
pub mod restaurants;

pub use favorites::{FavoriteService, FavoriteToggle};
pub use feed::{FeedReader, Visibility};
pub use publish::PostWriter;
pub use restaurants::RestaurantCatalog;
