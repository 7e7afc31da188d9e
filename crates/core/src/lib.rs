pub mod error;
pub mod format;
pub mod groups;
pub mod merge;
pub mod model;
pub mod output;
pub mod providers;
pub mod storage;
pub mod subscription;
pub mod template;

pub use error::SynthesisError;
pub use format::render_profile;
pub use merge::{synthesize, synthesize_to_yaml};
pub use model::Profile;
pub use subscription::Subscription;
pub use template::Template;
