pub mod notification_hub;
