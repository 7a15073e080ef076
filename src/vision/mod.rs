//! # Vision-AI Boundary
//!
//! The review loop only needs "prompt + image in, text out". [`VisionClient`] is that
//! seam; [`ChatCompletionsClient`] implements it for every supported vendor, and tests
//! substitute scripted clients.

mod openai;

pub use openai::ChatCompletionsClient;

use crate::error::VisionError;

/// A vision-capable model that answers a prompt about one image.
pub trait VisionClient {
    /// Send `prompt` with one JPEG image; returns the model's raw text reply.
    fn complete(&self, prompt: &str, image_jpeg: &[u8]) -> Result<String, VisionError>;

    /// Model identifier, for logs and reports.
    fn model(&self) -> &str;
}

impl<T: VisionClient + ?Sized> VisionClient for &T {
    fn complete(&self, prompt: &str, image_jpeg: &[u8]) -> Result<String, VisionError> {
        (**self).complete(prompt, image_jpeg)
    }

    fn model(&self) -> &str {
        (**self).model()
    }
}

impl<T: VisionClient + ?Sized> VisionClient for Box<T> {
    fn complete(&self, prompt: &str, image_jpeg: &[u8]) -> Result<String, VisionError> {
        (**self).complete(prompt, image_jpeg)
    }

    fn model(&self) -> &str {
        (**self).model()
    }
}
