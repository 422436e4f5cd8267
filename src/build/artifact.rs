//! The successful-build result.

use std::fmt;
use std::sync::Arc;

use crate::client::{ClientError, ImageId, ProviderClient};

/// Immutable reference to a captured image, returned on success.
///
/// The artifact owns a handle to the provider client so the caller can
/// discard the image later without rebuilding credentials.
#[derive(Clone)]
pub struct Artifact {
    image_name: String,
    image_id: ImageId,
    datacenter: String,
    client: Arc<dyn ProviderClient>,
}

impl Artifact {
    /// Creates an artifact record for a captured image.
    #[must_use]
    pub fn new(
        image_name: String,
        image_id: ImageId,
        datacenter: String,
        client: Arc<dyn ProviderClient>,
    ) -> Self {
        Self {
            image_name,
            image_id,
            datacenter,
            client,
        }
    }

    /// Name the image was captured under.
    #[must_use]
    pub fn image_name(&self) -> &str {
        &self.image_name
    }

    /// Provider identifier of the captured image.
    #[must_use]
    pub const fn image_id(&self) -> &ImageId {
        &self.image_id
    }

    /// Datacenter the build ran in.
    #[must_use]
    pub fn datacenter(&self) -> &str {
        &self.datacenter
    }

    /// Deletes the captured image from the provider.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the provider rejects the deletion.
    pub async fn destroy(&self) -> Result<(), ClientError> {
        self.client.delete_image(&self.image_id).await
    }
}

impl fmt::Debug for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Artifact")
            .field("image_name", &self.image_name)
            .field("image_id", &self.image_id)
            .field("datacenter", &self.datacenter)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "image {} ({}) in {}",
            self.image_name, self.image_id, self.datacenter
        )
    }
}
