//! Field name to parser dispatch tables.
//!
//! Keys are the analyzer's property names after key sanitization (see
//! [`crate::analyzer::sanitize_key`]). A field missing from its table is an
//! unhandled property.

use std::collections::HashMap;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Already a well-formed label or enum string.
    Label,
    Bool,
    Int,
    Float,
    Duration,
    /// An integer followed by one of `units`. `spaced` allows thousands groups
    /// separated by a single space.
    IntUnit {
        units: &'static [&'static str],
        spaced: bool,
    },
    /// A decimal number followed by `unit`.
    FloatUnit(&'static str),
    Bitrate,
    SamplingRate,
    Bytes,
    Date,
}

use FieldKind::*;

const PIXELS: FieldKind = IntUnit {
    units: &["pixels"],
    spaced: true,
};

pub static GENERAL_FIELDS: &[(&str, FieldKind)] = &[
    ("attachment", Bool),
    ("duration", Duration),
    ("file_size", Bytes),
    ("overall_bit_rate", Bitrate),
    ("encoded_date", Date),
    ("tagged_date", Date),
    ("complete_name", Label),
    ("format", Label),
    ("format_version", Label),
    ("movie_name", Label),
    ("overall_bit_rate_mode", Label),
    ("unique_id", Label),
    ("writing_application", Label),
    ("writing_library", Label),
];

pub static TRACK_FIELDS: &[(&str, FieldKind)] = &[
    ("format_settings__floor", Int),
    ("id", Int),
    ("streamid", Int),
    ("bits__pixel_frame_", Float),
    ("default", Bool),
    ("forced", Bool),
    ("format_settings__bvop", Bool),
    ("format_settings__qpel", Bool),
    ("format_settings__cabac", Bool),
    ("duration", Duration),
    ("delay_relative_to_video", Duration),
    ("width", PIXELS),
    ("height", PIXELS),
    ("original_width", PIXELS),
    ("original_height", PIXELS),
    ("frame_rate", FloatUnit("fps")),
    ("original_frame_rate", FloatUnit("fps")),
    (
        "format_settings__reframes",
        IntUnit {
            units: &["frames"],
            spaced: false,
        },
    ),
    (
        "channel_s_",
        IntUnit {
            units: &["channel", "channels"],
            spaced: false,
        },
    ),
    (
        "bit_depth",
        IntUnit {
            units: &["bits"],
            spaced: false,
        },
    ),
    ("bit_rate", Bitrate),
    ("maximum_bit_rate", Bitrate),
    ("minimum_bit_rate", Bitrate),
    ("nominal_bit_rate", Bitrate),
    ("sampling_rate", SamplingRate),
    ("stream_size", Bytes),
    ("bit_rate_mode", Label),
    ("channel_positions", Label),
    ("chroma_subsampling", Label),
    ("codec_id", Label),
    ("codec_id_info", Label),
    ("color_primaries", Label),
    ("color_space", Label),
    ("compression_mode", Label),
    ("display_aspect_ratio", Label),
    ("encoded_application_url", Label),
    ("encoding_settings", Label),
    ("format", Label),
    ("format_info", Label),
    ("format_profile", Label),
    ("format_settings__endianness", Label),
    ("frame_rate_mode", Label),
    ("language", Label),
    ("matrix_coefficients", Label),
    ("mode", Label),
    ("mode_extension", Label),
    ("muxing_mode", Label),
    ("original_display_aspect_ratio", Label),
    ("scan_type", Label),
    ("standard", Label),
    ("title", Label),
    ("transfer_characteristics", Label),
    ("type", Label),
    ("writing_application", Label),
    ("writing_library", Label),
];

/// Which property bag a field belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    General,
    Track,
}

static GENERAL_INDEX: LazyLock<HashMap<&'static str, FieldKind>> =
    LazyLock::new(|| GENERAL_FIELDS.iter().copied().collect());

static TRACK_INDEX: LazyLock<HashMap<&'static str, FieldKind>> =
    LazyLock::new(|| TRACK_FIELDS.iter().copied().collect());

pub fn lookup(section: Section, field: &str) -> Option<FieldKind> {
    let index = match section {
        Section::General => &GENERAL_INDEX,
        Section::Track => &TRACK_INDEX,
    };
    index.get(field).copied()
}
