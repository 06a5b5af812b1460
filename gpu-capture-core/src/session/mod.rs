pub mod command_list;
pub mod command_queue;
pub mod device;
pub mod dispatch;
pub mod objects;
pub mod ref_counter;
pub mod scope;
