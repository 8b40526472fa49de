use crate::{cfg::SortKey, display::Display};
use image::{imageops::FilterType, DynamicImage, GenericImageView};
use rayon::prelude::*;
use sha1::{Digest, Sha1};
use snafu::{ResultExt, Snafu};
use std::{
    fs,
    path::{Path, PathBuf},
    time::SystemTime,
};

const IMAGE_EXTS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp"];

#[derive(Snafu, Debug)]
pub enum Error {
    #[snafu(display("Can't create {}: {}", path.display(), source))]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Can't read image {}: {}", path.display(), source))]
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },

    #[snafu(display("Can't write image {}: {}", path.display(), source))]
    Encode {
        path: PathBuf,
        source: image::ImageError,
    },

    #[snafu(display("Can't split {} across zero displays", path.display()))]
    NoDisplays { path: PathBuf },
}

pub fn file_allowed(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Cache key for a source file. Hashes the path, not the contents, so a
/// thumbnail survives as long as the file stays where it is.
pub fn hash_name(path: &Path) -> String {
    let mut hasher = Sha1::new();
    hasher.update(path.to_string_lossy().as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn thumbnail_path(thumb_dir: &Path, src: &Path) -> PathBuf {
    thumb_dir.join(format!("{}.png", hash_name(src)))
}

/// Downscales into the bounding box unless the cached file already exists.
pub fn ensure_thumbnail(
    thumb_dir: &Path,
    src: &Path,
    (box_w, box_h): (u32, u32),
) -> Result<PathBuf, Error> {
    let dst = thumbnail_path(thumb_dir, src);
    if dst.is_file() {
        return Ok(dst);
    }

    let img = image::open(src).context(DecodeSnafu { path: src })?;
    img.thumbnail(box_w, box_h)
        .save(&dst)
        .context(EncodeSnafu { path: &dst })?;
    Ok(dst)
}

/// All allowed images under the wallpaper folder, in the configured order.
pub fn scan(wp_dir: &Path, sort: SortKey, reverse: bool) -> Vec<PathBuf> {
    let mut files: Vec<(PathBuf, SystemTime)> = walkdir::WalkDir::new(wp_dir)
        .into_iter()
        .filter_map(|ent| ent.ok())
        .filter(|ent| ent.file_type().is_file() && file_allowed(ent.path()))
        .map(|ent| {
            let mtime = ent
                .metadata()
                .ok()
                .and_then(|meta| meta.modified().ok())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            (ent.into_path(), mtime)
        })
        .collect();

    match sort {
        SortKey::Name => files.sort_by(|a, b| a.0.cmp(&b.0)),
        SortKey::Mtime => files.sort_by(|a, b| (a.1, &a.0).cmp(&(b.1, &b.0))),
    }
    if reverse {
        files.reverse();
    }

    files.into_iter().map(|(path, _)| path).collect()
}

/// Sources paired with their cached thumbnail, if one exists. Doesn't
/// generate anything.
pub fn listing(
    wp_dir: &Path,
    thumb_dir: &Path,
    sort: SortKey,
    reverse: bool,
) -> Vec<(PathBuf, Option<PathBuf>)> {
    scan(wp_dir, sort, reverse)
        .into_iter()
        .map(|src| {
            let thumb = thumbnail_path(thumb_dir, &src);
            let thumb = thumb.is_file().then(|| thumb);
            (src, thumb)
        })
        .collect()
}

/// Generates missing thumbnails in parallel. A file that fails to decode is
/// reported with a None thumbnail and doesn't stop the rest.
pub fn refresh_thumbnails(
    wp_dir: &Path,
    thumb_dir: &Path,
    thumb_box: (u32, u32),
    sort: SortKey,
    reverse: bool,
) -> Result<Vec<(PathBuf, Option<PathBuf>)>, Error> {
    fs::create_dir_all(thumb_dir).context(CreateDirSnafu { path: thumb_dir })?;

    Ok(scan(wp_dir, sort, reverse)
        .into_par_iter()
        .map(|src| match ensure_thumbnail(thumb_dir, &src, thumb_box) {
            Ok(thumb) => (src, Some(thumb)),
            Err(e) => {
                tracing::warn!("{}", e);
                (src, None)
            }
        })
        .collect())
}

/// Scales preserving aspect until the target box is covered, then
/// center-crops to exactly the target size.
pub fn cover_crop(img: &DynamicImage, width: u32, height: u32) -> DynamicImage {
    let (src_w, src_h) = img.dimensions();
    let scale = f64::max(
        width as f64 / src_w as f64,
        height as f64 / src_h as f64,
    );
    let scaled_w = ((src_w as f64 * scale).round() as u32).max(width);
    let scaled_h = ((src_h as f64 * scale).round() as u32).max(height);

    let resized = img.resize_exact(scaled_w, scaled_h, FilterType::Lanczos3);
    resized.crop_imm((scaled_w - width) / 2, (scaled_h - height) / 2, width, height)
}

pub fn scale_and_crop(
    bg_dir: &Path,
    src: &Path,
    width: u32,
    height: u32,
) -> Result<PathBuf, Error> {
    fs::create_dir_all(bg_dir).context(CreateDirSnafu { path: bg_dir })?;
    let img = image::open(src).context(DecodeSnafu { path: src })?;

    let dst = bg_dir.join(format!("{}x{}-{}.png", width, height, hash_name(src)));
    cover_crop(&img, width, height)
        .save(&dst)
        .context(EncodeSnafu { path: &dst })?;
    Ok(dst)
}

/// Mirrored copy in the backgrounds folder.
pub fn flip(bg_dir: &Path, src: &Path) -> Result<PathBuf, Error> {
    fs::create_dir_all(bg_dir).context(CreateDirSnafu { path: bg_dir })?;
    let img = image::open(src).context(DecodeSnafu { path: src })?;

    let dst = bg_dir.join(format!("flipped-{}.png", hash_name(src)));
    img.fliph().save(&dst).context(EncodeSnafu { path: &dst })?;
    Ok(dst)
}

/// Source x-spans proportional to the display widths. Rounding happens on
/// the cumulative edge so the bands tile the source exactly.
fn split_spans(src_w: u32, widths: &[u32]) -> Vec<(u32, u32)> {
    let total: u64 = widths.iter().map(|w| u64::from(*w)).sum();
    if total == 0 {
        return Vec::new();
    }

    let edge = |prefix: u64| (u64::from(src_w) * prefix + total / 2) / total;
    let mut spans = Vec::with_capacity(widths.len());
    let mut prefix = 0;
    for w in widths {
        let start = edge(prefix);
        prefix += u64::from(*w);
        spans.push((start as u32, (edge(prefix) - start) as u32));
    }
    spans
}

/// Cuts the source into one band per display, left to right, each band
/// cover-cropped to its display's exact size.
pub fn split(bg_dir: &Path, src: &Path, displays: &[Display]) -> Result<Vec<PathBuf>, Error> {
    snafu::ensure!(!displays.is_empty(), NoDisplaysSnafu { path: src });
    fs::create_dir_all(bg_dir).context(CreateDirSnafu { path: bg_dir })?;
    let img = image::open(src).context(DecodeSnafu { path: src })?;

    let widths: Vec<u32> = displays.iter().map(|d| d.width).collect();
    let spans = split_spans(img.width(), &widths);

    let mut slices = Vec::with_capacity(displays.len());
    for (i, (display, (x, w))) in displays.iter().zip(spans).enumerate() {
        let band = img.crop_imm(x, 0, w, img.height());
        let dst = bg_dir.join(format!("split-{}-{}.png", i, hash_name(src)));
        cover_crop(&band, display.width, display.height)
            .save(&dst)
            .context(EncodeSnafu { path: &dst })?;
        slices.push(dst);
    }
    Ok(slices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn checkered(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_fn(w, h, |x, y| {
            if (x + y) % 2 == 0 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 255])
            }
        }))
    }

    fn write_image(dir: &Path, name: &str, w: u32, h: u32) -> PathBuf {
        let path = dir.join(name);
        checkered(w, h).save(&path).unwrap();
        path
    }

    #[test]
    fn spans_are_proportional_and_tile_the_source() {
        assert_eq!(split_spans(3000, &[1920, 1080]), vec![(0, 1920), (1920, 1080)]);
        assert_eq!(
            split_spans(1000, &[1, 1, 1]),
            vec![(0, 333), (333, 334), (667, 333)]
        );
        assert_eq!(split_spans(100, &[]), Vec::new());
        assert_eq!(split_spans(100, &[0, 0]), Vec::new());
    }

    #[test]
    fn cover_crop_hits_exact_target_size() {
        let img = checkered(64, 64);
        for &(w, h) in &[(10, 20), (20, 10), (64, 64), (128, 3)] {
            let out = cover_crop(&img, w, h);
            assert_eq!(out.dimensions(), (w, h));
        }
    }

    #[test]
    fn split_produces_one_exact_slice_per_display() {
        let dir = tempfile::tempdir().unwrap();
        let src = write_image(dir.path(), "src.png", 300, 100);

        let displays = vec![
            Display {
                name: "DP-1".into(),
                width: 100,
                height: 50,
            },
            Display {
                name: "DP-2".into(),
                width: 50,
                height: 100,
            },
        ];
        let slices = split(dir.path(), &src, &displays).unwrap();
        assert_eq!(slices.len(), 2);
        for (slice, display) in slices.iter().zip(&displays) {
            let img = image::open(slice).unwrap();
            assert_eq!(img.dimensions(), (display.width, display.height));
        }
    }

    #[test]
    fn split_without_displays_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let src = write_image(dir.path(), "src.png", 30, 10);
        assert!(matches!(
            split(dir.path(), &src, &[]),
            Err(Error::NoDisplays { .. })
        ));
    }

    #[test]
    fn flipping_twice_restores_the_pixels() {
        let dir = tempfile::tempdir().unwrap();
        let src = write_image(dir.path(), "src.png", 8, 4);

        let once = flip(dir.path(), &src).unwrap();
        let twice = flip(dir.path(), &once).unwrap();
        assert_ne!(once, twice);

        let original = image::open(&src).unwrap().to_rgba8();
        let restored = image::open(&twice).unwrap().to_rgba8();
        assert_eq!(original.as_raw(), restored.as_raw());
    }

    #[test]
    fn thumbnail_is_only_generated_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let src = write_image(dir.path(), "src.png", 100, 100);
        let thumb_dir = dir.path().join("thumbs");
        fs::create_dir(&thumb_dir).unwrap();

        let thumb = ensure_thumbnail(&thumb_dir, &src, (24, 24)).unwrap();
        assert!(thumb.is_file());

        fs::write(&thumb, b"sentinel").unwrap();
        let again = ensure_thumbnail(&thumb_dir, &src, (24, 24)).unwrap();
        assert_eq!(thumb, again);
        assert_eq!(fs::read(&thumb).unwrap(), b"sentinel");
    }

    #[test]
    fn unreadable_source_fails_alone_in_a_refresh() {
        let dir = tempfile::tempdir().unwrap();
        write_image(dir.path(), "good.png", 40, 40);
        fs::write(dir.path().join("bad.png"), b"not an image").unwrap();

        let thumb_dir = dir.path().join("thumbs");
        let pairs =
            refresh_thumbnails(dir.path(), &thumb_dir, (24, 24), SortKey::Name, false).unwrap();
        assert_eq!(pairs.len(), 2);

        let ok: Vec<_> = pairs.iter().filter(|(_, thumb)| thumb.is_some()).collect();
        assert_eq!(ok.len(), 1);
        assert!(ok[0].0.ends_with("good.png"));
    }

    #[test]
    fn hash_name_is_stable_per_path() {
        let a = hash_name(Path::new("/wp/a.jpg"));
        assert_eq!(a, hash_name(Path::new("/wp/a.jpg")));
        assert_ne!(a, hash_name(Path::new("/wp/b.jpg")));
        assert_eq!(a.len(), 40);
    }

    #[test]
    fn extension_filter_is_case_insensitive() {
        assert!(file_allowed(Path::new("a.JPG")));
        assert!(file_allowed(Path::new("b.webp")));
        assert!(!file_allowed(Path::new("c.txt")));
        assert!(!file_allowed(Path::new("noext")));
    }
}
