pub mod feed;
pub mod follow;
pub mod post;
pub mod user;

pub use feed::{Feed, FeedWithOwner, NewFeed};
pub use follow::{FeedFollow, FollowedFeed};
pub use post::{NewPost, Post};
pub use user::User;
