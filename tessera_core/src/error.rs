// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error type for engine misuse.
//!
//! Only misuse is an error. Stale input (a buffer or update that matches no
//! pending frame) is logged and absorbed, resource pressure is handled by
//! eager reclamation, and ordering anomalies are logged diagnostics. Operating
//! on something that has been disposed would corrupt invariants, so those calls
//! fail loudly with an [`Error`].

use crate::buffer::SurfaceId;

/// Errors reported to the host.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The engine has been disposed; no further operations are accepted.
    #[error("engine has been disposed")]
    Disposed,
    /// The surface's buffer pool was closed, so no more buffers can be acquired
    /// from it.
    #[error("buffer pool for {0:?} is closed")]
    PoolClosed(SurfaceId),
    /// The surface is not the current surface of any region. It was replaced
    /// by a resize, released, or never created.
    #[error("{0:?} is not an active surface")]
    UnknownSurface(SurfaceId),
}

/// Result alias defaulting to [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_surface() {
        let msg = Error::PoolClosed(SurfaceId(3)).to_string();
        assert_eq!(msg, "buffer pool for SurfaceId(3) is closed");
        let msg = Error::UnknownSurface(SurfaceId(9)).to_string();
        assert_eq!(msg, "SurfaceId(9) is not an active surface");
    }
}
