//! Random decorative images in the bottom-right corner of slides.

use crate::media::ImageAsset;
use crate::presentation::Presentation;
use deck_core::units::inches;
use deck_core::{Rect, SkipReason, Skipped};
use rand::seq::IndexedRandom;
use rand::Rng;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq)]
pub struct DecorateOptions {
    /// Leading slides left undecorated.
    pub skip_leading: usize,
    /// Gap between the image and the slide's bottom and right edges, in EMU.
    pub margin: i64,
    /// Square size used when an image cannot be placed at its native size.
    pub fallback_size: i64,
}

impl Default for DecorateOptions {
    fn default() -> Self {
        Self {
            skip_leading: 1,
            margin: 0,
            fallback_size: inches(2.0),
        }
    }
}

/// One decoration that made it onto a slide.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Placement {
    pub slide: usize,
    pub asset: String,
    pub rect: Rect,
    pub fallback: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DecorateReport {
    pub placed: Vec<Placement>,
    pub skipped: Vec<Skipped>,
}

impl DecorateReport {
    pub fn fallbacks(&self) -> usize {
        self.placed.iter().filter(|p| p.fallback).count()
    }
}

/// Put one randomly chosen asset on every slide after the leading ones.
pub fn decorate_slides<R: Rng + ?Sized>(
    pres: &mut Presentation,
    pool: &[ImageAsset],
    rng: &mut R,
    options: &DecorateOptions,
) -> DecorateReport {
    let mut report = DecorateReport::default();
    if pool.is_empty() {
        log::warn!("No decorative elements available");
        return report;
    }

    let (width, height) = (pres.slide_width(), pres.slide_height());
    for index in options.skip_leading..pres.slide_count() {
        let asset = match pool.choose(rng) {
            Some(asset) => asset,
            None => break,
        };

        let rect = Rect::bottom_right(width, height, asset.width, asset.height, options.margin);
        match pres.add_picture(index, &asset.image, rect, &asset.name) {
            Ok(()) => {
                log::debug!("Slide {}: added {}", index + 1, asset.name);
                report.placed.push(Placement {
                    slide: index,
                    asset: asset.name.clone(),
                    rect,
                    fallback: false,
                });
                continue;
            }
            Err(e) => log::warn!("Could not add {} to slide {}: {}", asset.name, index + 1, e),
        }

        let size = options.fallback_size;
        let rect = Rect::bottom_right(width, height, size, size, options.margin);
        match pres.add_picture(index, &asset.image, rect, &asset.name) {
            Ok(()) => report.placed.push(Placement {
                slide: index,
                asset: asset.name.clone(),
                rect,
                fallback: true,
            }),
            Err(e) => {
                log::warn!("Giving up on decoration for slide {}: {}", index + 1, e);
                report.skipped.push(Skipped::new(
                    format!("slide {}", index + 1),
                    SkipReason::Failed(e.to_string()),
                ));
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{png_bytes, FixtureDeck, FixtureSlide, SLIDE_HEIGHT, SLIDE_WIDTH};
    use crate::shapes::{non_visual_props, shape_rect};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::io::Cursor;

    fn deck(slides: usize) -> Presentation {
        let deck = FixtureDeck::new((0..slides).map(|_| FixtureSlide::new("")).collect());
        Presentation::from_reader(Cursor::new(deck.build())).unwrap()
    }

    fn asset(name: &str, w: u32, h: u32) -> ImageAsset {
        ImageAsset::from_bytes(name, png_bytes(w, h, None)).unwrap()
    }

    #[test]
    fn test_decorations_are_flush_bottom_right() {
        let mut pres = deck(4);
        let pool = vec![asset("a.png", 96, 48), asset("b.png", 192, 96)];
        let mut rng = StdRng::seed_from_u64(7);
        let report = decorate_slides(&mut pres, &pool, &mut rng, &DecorateOptions::default());

        assert_eq!(report.placed.len(), 3);
        assert!(report.skipped.is_empty());
        assert_eq!(pres.slides()[0].shapes().count(), 0);

        for placement in &report.placed {
            let slide = &pres.slides()[placement.slide];
            let pic = slide.shapes().last().unwrap();
            let rect = shape_rect(pic).unwrap();
            assert_eq!(rect, placement.rect);
            assert_eq!(rect.right(), SLIDE_WIDTH);
            assert_eq!(rect.bottom(), SLIDE_HEIGHT);
            assert_eq!(
                non_visual_props(pic).unwrap().attr("descr"),
                Some(placement.asset.as_str())
            );
        }
    }

    #[test]
    fn test_same_seed_same_choices() {
        let pool: Vec<ImageAsset> = (0..5).map(|i| asset(&format!("{}.png", i), 8 + i, 8)).collect();
        let run = |seed| {
            let mut pres = deck(6);
            let mut rng = StdRng::seed_from_u64(seed);
            decorate_slides(&mut pres, &pool, &mut rng, &DecorateOptions::default())
                .placed
                .into_iter()
                .map(|p| p.asset)
                .collect::<Vec<_>>()
        };
        assert_eq!(run(42), run(42));
    }

    #[test]
    fn test_zero_size_asset_uses_fallback() {
        let mut pres = deck(2);
        let mut bad = asset("flat.png", 4, 4);
        bad.height = 0;
        let mut rng = StdRng::seed_from_u64(1);
        let report = decorate_slides(&mut pres, &[bad], &mut rng, &DecorateOptions::default());

        assert_eq!(report.fallbacks(), 1);
        let rect = report.placed[0].rect;
        assert_eq!((rect.width, rect.height), (inches(2.0), inches(2.0)));
        assert_eq!(rect.right(), SLIDE_WIDTH);
        assert_eq!(rect.bottom(), SLIDE_HEIGHT);
    }

    #[test]
    fn test_failed_fallback_is_recorded() {
        let mut pres = deck(2);
        let mut bad = asset("flat.png", 4, 4);
        bad.width = 0;
        let options = DecorateOptions {
            fallback_size: 0,
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(1);
        let report = decorate_slides(&mut pres, &[bad], &mut rng, &options);
        assert!(report.placed.is_empty());
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].target, "slide 2");
    }

    #[test]
    fn test_empty_pool_is_a_no_op() {
        let mut pres = deck(3);
        let mut rng = StdRng::seed_from_u64(1);
        let report = decorate_slides(&mut pres, &[], &mut rng, &DecorateOptions::default());
        assert_eq!(report, DecorateReport::default());
        assert!(pres.slides().iter().all(|s| s.shapes().count() == 0));
    }
}
