pub mod delivery;
pub mod router;

pub use delivery::DeliveryWorker;
pub use router::NotificationRouter;
