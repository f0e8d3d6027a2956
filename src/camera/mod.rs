pub mod camera_entity;
pub mod camera_media;
pub mod frame_slot;
