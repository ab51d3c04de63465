pub mod create;
pub mod destroy;
pub mod gather;
pub mod modify;
pub mod to_be_deleted;
