//! Concrete build steps.
//!
//! Each file holds one step: its run phase, its cleanup phase, and any
//! per-step configuration captured at construction time.

mod capture_image;
mod connect;
mod create_instance;
mod create_ssh_key;
mod grab_public_ip;
mod provision;
mod wait_for_instance;

pub use capture_image::CaptureImage;
pub use connect::Connect;
pub use create_instance::CreateInstance;
pub use create_ssh_key::CreateSshKey;
pub use grab_public_ip::GrabPublicIp;
pub use provision::Provision;
pub use wait_for_instance::WaitForInstance;
