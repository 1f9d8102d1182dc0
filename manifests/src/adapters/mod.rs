mod ports;
mod receivers;

pub use ports::{collector_ports, receiver_ports, ContainerPort};
pub use receivers::{delegate_to_target_allocator, scrape_configs};
