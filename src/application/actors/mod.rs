pub mod dispatch_actor;
pub mod price_feed;
