//! Tag dialect priority table.
//!
//! A container may carry several tag blocks at once (an MP3 with both ID3v2
//! and ID3v1, a FLAC with Vorbis comments and a stray ID3v2). Each field is
//! resolved by walking [`Dialect::PRIORITY`] and, within a dialect, the
//! field's key variants; the first non-empty value wins.

use crate::models::CoverArt;
use crate::numeric::leading_number;
use lofty::file::{TaggedFile, TaggedFileExt};
use lofty::picture::{Picture, PictureType};
use lofty::tag::{ItemKey, Tag, TagType};
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    Id3v2,
    Mp4,
    Vorbis,
    Ape,
    RiffInfo,
    AiffText,
    Id3v1,
}

impl Dialect {
    /// Resolution order, most expressive first.
    pub const PRIORITY: [Dialect; 7] = [
        Self::Id3v2,
        Self::Mp4,
        Self::Vorbis,
        Self::Ape,
        Self::RiffInfo,
        Self::AiffText,
        Self::Id3v1,
    ];

    pub fn tag_type(self) -> TagType {
        match self {
            Self::Id3v2 => TagType::Id3v2,
            Self::Mp4 => TagType::Mp4Ilst,
            Self::Vorbis => TagType::VorbisComments,
            Self::Ape => TagType::Ape,
            Self::RiffInfo => TagType::RiffInfo,
            Self::AiffText => TagType::AiffText,
            Self::Id3v1 => TagType::Id3v1,
        }
    }

    /// Tags present in `file`, in priority order.
    pub(crate) fn present(file: &TaggedFile) -> impl Iterator<Item = (Dialect, &Tag)> {
        Self::PRIORITY
            .into_iter()
            .filter_map(|dialect| file.tag(dialect.tag_type()).map(|tag| (dialect, tag)))
    }
}

/// A canonical field and the generic keys it may be stored under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Title,
    Artist,
    Album,
    Year,
    Track,
    Disc,
    Genre,
    Lyrics,
}

static FIELD_KEYS: LazyLock<Vec<(Field, Vec<ItemKey>)>> = LazyLock::new(|| {
    vec![
        (Field::Title, vec![ItemKey::TrackTitle]),
        (Field::Artist, vec![ItemKey::TrackArtist, ItemKey::AlbumArtist]),
        (Field::Album, vec![ItemKey::AlbumTitle]),
        (
            Field::Year,
            vec![ItemKey::Year, ItemKey::RecordingDate, ItemKey::OriginalReleaseDate],
        ),
        (Field::Track, vec![ItemKey::TrackNumber]),
        (Field::Disc, vec![ItemKey::DiscNumber]),
        (Field::Genre, vec![ItemKey::Genre]),
        (Field::Lyrics, vec![ItemKey::Lyrics]),
    ]
});

impl Field {
    pub fn keys(self) -> &'static [ItemKey] {
        FIELD_KEYS
            .iter()
            .find(|(field, _)| *field == self)
            .map(|(_, keys)| keys.as_slice())
            .unwrap_or(&[])
    }

    /// First non-empty (trimmed) value across dialects and key variants.
    pub(crate) fn text(self, file: &TaggedFile) -> Option<String> {
        self.resolve(file, |value| Some(value.to_string()))
    }

    /// First value whose leading digits parse; unparsable values don't block
    /// later dialects.
    pub(crate) fn number(self, file: &TaggedFile) -> Option<u32> {
        self.resolve(file, leading_number)
    }

    fn resolve<T>(self, file: &TaggedFile, mut parse: impl FnMut(&str) -> Option<T>) -> Option<T> {
        Dialect::present(file).find_map(|(_, tag)| {
            self.keys().iter().find_map(|key| {
                let value = tag.get_string(key)?.trim();
                if value.is_empty() {
                    return None;
                }
                parse(value)
            })
        })
    }
}

/// Front cover first, then any picture, checked dialect by dialect.
pub(crate) fn cover_art(file: &TaggedFile) -> Option<CoverArt> {
    Dialect::present(file).find_map(|(_, tag)| {
        let pictures = tag.pictures();
        pictures
            .iter()
            .find(|picture| picture.pic_type() == PictureType::CoverFront && !picture.data().is_empty())
            .or_else(|| pictures.iter().find(|picture| !picture.data().is_empty()))
            .map(to_cover_art)
    })
}

fn to_cover_art(picture: &Picture) -> CoverArt {
    let declared = picture
        .mime_type()
        .map(|mime| mime.as_str().trim().to_ascii_lowercase())
        .filter(|mime| mime.starts_with("image/"));
    let mime = declared
        .or_else(|| sniff_image_mime(picture.data()).map(str::to_string))
        .unwrap_or_else(|| "image/jpeg".to_string());
    CoverArt {
        data: picture.data().to_vec(),
        mime,
    }
}

/// Identify common image formats by their magic bytes.
pub(crate) fn sniff_image_mime(data: &[u8]) -> Option<&'static str> {
    match data {
        [0x89, b'P', b'N', b'G', ..] => Some("image/png"),
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        [b'G', b'I', b'F', b'8', ..] => Some("image/gif"),
        [b'B', b'M', ..] => Some("image/bmp"),
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some("image/webp"),
        [b'I', b'I', 0x2A, 0x00, ..] | [b'M', b'M', 0x00, 0x2A, ..] => Some("image/tiff"),
        _ => None,
    }
}
