//! Container-specific I/O implementations
//!
//! Each container format (JPEG, PNG, MP3) has an I/O implementation that
//! knows how to locate, read, and splice the embedded manifest store
//! without touching any other byte of the asset.

use crate::{error::Result, segment::Exclusion, structure::Structure};
use std::io::{Read, Seek, Write};

/// Container format - defines how a file is structured on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    /// JPEG container (marker-segment structure)
    #[cfg(feature = "jpeg")]
    Jpeg,

    /// PNG container (chunk-based structure)
    #[cfg(feature = "png")]
    Png,

    /// MP3 container (ID3v2 tag + MPEG frames)
    #[cfg(feature = "mp3")]
    Mp3,
}

/// Trait for container-specific I/O operations
///
/// Implementations never decode media content; they walk the container's
/// structural records, record exact offsets, and rewrite only the byte
/// ranges that carry the manifest store.
pub trait ContainerIO: Send + Sync {
    /// ContainerKind this I/O implementation manages
    fn container_type() -> ContainerKind
    where
        Self: Sized;

    /// File extensions this I/O implementation accepts (e.g., ["jpg", "jpeg"])
    fn extensions() -> &'static [&'static str]
    where
        Self: Sized;

    /// MIME types this I/O implementation accepts
    fn mime_types() -> &'static [&'static str]
    where
        Self: Sized;

    /// Cheap magic-byte test on the first few bytes. Never errors.
    fn can_read(prefix: &[u8]) -> bool
    where
        Self: Sized;

    /// Parse file structure in a single pass
    ///
    /// Discovers every segment and the manifest-store carriers without
    /// loading segment data. Rejects with `Error::NotAValidAsset` when the
    /// magic does not match.
    fn parse<R: Read + Seek>(&self, source: &mut R) -> Result<Structure>;

    /// Read and assemble the embedded manifest-store (JUMBF) bytes
    ///
    /// Handles container-specific multiplexing such as JPEG's multi-segment
    /// APP11 carriage. Returns `None` when the asset has no manifest store.
    fn read_manifest_store<R: Read + Seek>(
        &self,
        structure: &Structure,
        source: &mut R,
    ) -> Result<Option<Vec<u8>>>;

    /// Write the asset with the manifest store inserted, replaced, or
    /// (when `manifest` is `None`) removed; every other byte is preserved.
    ///
    /// Streams from `source` to `writer`; never writes in place.
    fn write_manifest_store<R: Read + Seek, W: Write>(
        &self,
        structure: &Structure,
        source: &mut R,
        writer: &mut W,
        manifest: Option<&[u8]>,
    ) -> Result<()>;

    /// Byte ranges to exclude when computing the data hash
    ///
    /// At minimum the manifest-store carrier segments, plus the reserved
    /// signature range when the caller is hashing a not-yet-signed layout.
    fn data_hash_exclusions(
        &self,
        structure: &Structure,
        placeholder_signature: Option<Exclusion>,
    ) -> Result<Vec<Exclusion>>;
}

// ContainerKind I/O modules - pub(crate) so register_containers! macro can access them
#[cfg(feature = "jpeg")]
pub(crate) mod jpeg_io;

#[cfg(feature = "mp3")]
pub(crate) mod mp3_io;

#[cfg(feature = "png")]
pub(crate) mod png_io;

// ============================================================================
// ContainerKind Registration Macro
// ============================================================================

/// Register all supported container formats in one place
///
/// This macro generates:
/// - Handler enum for internal use (zero-cost dispatch)
/// - Handler implementation with container delegation
/// - detect_container() function
/// - get_handler() function
/// - Extension and MIME type lookup
/// - ContainerKind methods for MIME types and extensions
macro_rules! register_containers {
    ($(
        $(#[$meta:meta])*
        $variant:ident => $module:ident :: $io:ident
    ),* $(,)?) => {
        // Generate Handler enum for internal use (zero-cost dispatch)
        pub(crate) enum Handler {
            $(
                $(#[$meta])*
                $variant($module::$io),
            )*
        }

        // Generate Handler implementation - delegates to specific I/O implementations
        impl Handler {
            #[allow(unreachable_patterns)]
            pub(crate) fn parse<R: std::io::Read + std::io::Seek>(
                &self,
                source: &mut R,
            ) -> $crate::Result<$crate::Structure> {
                match self {
                    $(
                        $(#[$meta])*
                        Handler::$variant(h) => h.parse(source),
                    )*
                }
            }

            #[allow(unreachable_patterns)]
            pub(crate) fn read_manifest_store<R: std::io::Read + std::io::Seek>(
                &self,
                structure: &$crate::Structure,
                source: &mut R,
            ) -> $crate::Result<Option<Vec<u8>>> {
                match self {
                    $(
                        $(#[$meta])*
                        Handler::$variant(h) => h.read_manifest_store(structure, source),
                    )*
                }
            }

            #[allow(unreachable_patterns)]
            pub(crate) fn write_manifest_store<
                R: std::io::Read + std::io::Seek,
                W: std::io::Write,
            >(
                &self,
                structure: &$crate::Structure,
                source: &mut R,
                writer: &mut W,
                manifest: Option<&[u8]>,
            ) -> $crate::Result<()> {
                match self {
                    $(
                        $(#[$meta])*
                        Handler::$variant(h) => {
                            h.write_manifest_store(structure, source, writer, manifest)
                        }
                    )*
                }
            }

            #[allow(unreachable_patterns)]
            pub(crate) fn data_hash_exclusions(
                &self,
                structure: &$crate::Structure,
                placeholder_signature: Option<$crate::Exclusion>,
            ) -> $crate::Result<Vec<$crate::Exclusion>> {
                match self {
                    $(
                        $(#[$meta])*
                        Handler::$variant(h) => {
                            h.data_hash_exclusions(structure, placeholder_signature)
                        }
                    )*
                }
            }
        }

        /// Detect container from file header
        pub(crate) fn detect_container<R: std::io::Read + std::io::Seek>(
            source: &mut R
        ) -> $crate::Result<ContainerKind> {
            use std::io::SeekFrom;

            source.seek(SeekFrom::Start(0))?;
            let mut header = [0u8; 16];
            let n = source.read(&mut header)?;
            let header = &header[..n];

            if n < 2 {
                return Err($crate::Error::UnsupportedFormat);
            }

            $(
                $(#[$meta])*
                if $module::$io::can_read(header) {
                    return Ok($module::$io::container_type());
                }
            )*

            Err($crate::Error::UnsupportedFormat)
        }

        /// Get handler for a container
        pub(crate) fn get_handler(container: ContainerKind) -> Handler {
            match container {
                $(
                    $(#[$meta])*
                    ContainerKind::$variant => Handler::$variant($module::$io::new()),
                )*
            }
        }

        /// Detect container from file extension
        pub fn detect_from_extension(ext: &str) -> Option<ContainerKind> {
            let ext_lower = ext.to_lowercase();
            $(
                $(#[$meta])*
                if $module::$io::extensions().contains(&ext_lower.as_str()) {
                    return Some($module::$io::container_type());
                }
            )*
            None
        }

        /// Detect container from MIME type
        pub fn detect_from_mime(mime: &str) -> Option<ContainerKind> {
            $(
                $(#[$meta])*
                if $module::$io::mime_types().iter().any(|m| m.eq_ignore_ascii_case(mime)) {
                    return Some($module::$io::container_type());
                }
            )*
            None
        }

        // Generate ContainerKind methods
        impl ContainerKind {
            /// Get the primary MIME type for this container
            pub fn to_mime(&self) -> &'static str {
                self.mime_types()[0]
            }

            /// Get the primary file extension for this container
            pub fn to_extension(&self) -> &'static str {
                self.extensions()[0]
            }

            /// Get all supported MIME types for this container
            pub fn mime_types(&self) -> &'static [&'static str] {
                match self {
                    $(
                        $(#[$meta])*
                        ContainerKind::$variant => $module::$io::mime_types(),
                    )*
                }
            }

            /// Get all supported file extensions for this container
            pub fn extensions(&self) -> &'static [&'static str] {
                match self {
                    $(
                        $(#[$meta])*
                        ContainerKind::$variant => $module::$io::extensions(),
                    )*
                }
            }
        }

        impl std::fmt::Display for ContainerKind {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.to_mime())
            }
        }
    };
}

// ============================================================================
// SINGLE POINT OF REGISTRATION
// To add a new container, just add one line here!
// ============================================================================
register_containers! {
    #[cfg(feature = "jpeg")]
    Jpeg => jpeg_io::JpegIO,

    #[cfg(feature = "png")]
    Png => png_io::PngIO,

    #[cfg(feature = "mp3")]
    Mp3 => mp3_io::Mp3IO,
}

/// Stream-copy `size` bytes from `source` to `writer` in bounded chunks
pub(crate) fn copy_bytes<R: Read, W: Write>(
    source: &mut R,
    writer: &mut W,
    size: u64,
) -> Result<()> {
    const CHUNK_SIZE: usize = 8 * 1024 * 1024;

    let mut remaining = size;
    let mut buffer = vec![0u8; CHUNK_SIZE.min(remaining as usize).max(1)];

    while remaining > 0 {
        let to_read = remaining.min(buffer.len() as u64) as usize;
        source.read_exact(&mut buffer[..to_read])?;
        writer.write_all(&buffer[..to_read])?;
        remaining -= to_read as u64;
    }

    Ok(())
}
