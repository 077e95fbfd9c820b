mod catalog;

pub use catalog::{catalog, expected_labels, find_client, ClientEntry, DeviceModel};
