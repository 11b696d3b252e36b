//! Building a deck from outline entries and a template presentation.

use crate::merge::MergeOptions;
use crate::presentation::Presentation;
use deck_core::{Error, LogoRules, OutlineEntry, Result, Skipped};
use serde::Serialize;

/// Which template slides to use and how to fill them.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateOptions {
    /// Slide duplicated once per outline entry, then removed.
    pub template_index: usize,
    /// Slide removed from the output when present.
    pub stale_index: Option<usize>,
    pub merge: MergeOptions,
    pub rules: LogoRules,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            template_index: 1,
            stale_index: Some(2),
            merge: MergeOptions::default(),
            rules: LogoRules::default(),
        }
    }
}

/// Summary of a [`populate`] run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PopulateReport {
    /// Final indices of the generated slides, in outline order.
    pub generated: Vec<usize>,
    /// `sldId` ids of the removed template slides.
    pub removed: Vec<u32>,
    pub skipped: Vec<Skipped>,
}

/// Duplicate the template slide for every outline entry, fill it in, then
/// drop the template and the stale slide.
pub fn populate(
    pres: &mut Presentation,
    entries: &[OutlineEntry],
    options: &GenerateOptions,
) -> Result<PopulateReport> {
    let count = pres.slide_count();
    let needed = (options.template_index + 1).max(2);
    if count < needed {
        return Err(Error::TemplateError(format!(
            "Presentation needs at least {} slides to use as template, found {}",
            needed, count
        )));
    }

    let template_id = pres.slide(options.template_index)?.id();
    let stale_id = options
        .stale_index
        .filter(|&index| index != options.template_index)
        .and_then(|index| pres.slides().get(index))
        .map(|slide| slide.id());

    let mut report = PopulateReport::default();
    let mut created = Vec::with_capacity(entries.len());

    for entry in entries {
        let dup = pres.duplicate_slide(options.template_index, &options.rules)?;
        report.skipped.extend(dup.skipped);
        report.skipped.extend(dup.normalize.skipped);

        let merged = pres.merge_content(dup.index, entry, &options.merge, &options.rules)?;
        report.skipped.extend(merged.skipped);
        report.skipped.extend(merged.normalize.skipped);

        log::debug!("Slide for '{}' created", entry.title);
        created.push(pres.slides()[dup.index].id());
    }

    for id in stale_id.into_iter().chain(std::iter::once(template_id)) {
        pres.remove_slide(id)?;
        report.removed.push(id);
    }

    report.generated = created
        .iter()
        .filter_map(|id| pres.slides().iter().position(|s| s.id() == *id))
        .collect();

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{picture_shape, text_shape, FixtureDeck, FixtureSlide, SLIDE_WIDTH};
    use crate::shapes::{paragraph_text, shape_name, shape_rect};
    use deck_core::units::inches;
    use deck_core::Rect;
    use std::io::Cursor;

    fn template_slide() -> FixtureSlide {
        let wide = Rect::new(inches(0.5), inches(0.5), inches(8.0), inches(1.0));
        let body = Rect::new(inches(0.5), inches(2.0), inches(8.0), inches(3.0));
        let logo = Rect::new(inches(1.0), inches(5.0), inches(2.0), inches(2.0));
        FixtureSlide::new(
            [
                text_shape(2, "Title", wide, &["OBJECTIVES"]),
                text_shape(3, "Body", body, &["By the end of this module", "placeholder"]),
                picture_shape(4, "Logo", "rId2", logo),
            ]
            .concat(),
        )
        .with_layout(2)
        .with_image("rId2")
    }

    fn deck(slides: usize) -> Presentation {
        let mut all = vec![FixtureSlide::new(text_shape(2, "Cover", Rect::new(0, 0, 10, 10), &["Cover"]))];
        if slides > 1 {
            all.push(template_slide());
        }
        for i in 2..slides {
            all.push(FixtureSlide::new(text_shape(2, "Stale", Rect::new(0, 0, 10, 10), &[&format!("Stale {}", i)])));
        }
        Presentation::from_reader(Cursor::new(FixtureDeck::new(all).build())).unwrap()
    }

    #[test]
    fn test_goals_scenario() {
        let mut pres = deck(3);
        let entries = vec![OutlineEntry::new("Goals").with_bullet("A", 0).with_bullet("B", 1)];
        let report = populate(&mut pres, &entries, &GenerateOptions::default()).unwrap();
        assert_eq!(report.generated, vec![1]);
        assert_eq!(report.removed.len(), 2);
        assert!(report.skipped.is_empty(), "{:?}", report.skipped);

        let mut pres = Presentation::from_reader(Cursor::new(pres.to_bytes().unwrap())).unwrap();
        assert_eq!(pres.slide_count(), 2);
        assert_eq!(pres.slides()[0].texts(), vec!["Cover (more)".to_string()]);

        let slide = &pres.slides()[1];
        let title = slide.shapes().find(|s| shape_name(s) == "Title").unwrap();
        assert_eq!(crate::shapes::shape_text(title).as_deref(), Some("Goals"));

        let body = slide.shapes().find(|s| shape_name(s) == "Body").unwrap();
        let paragraphs: Vec<_> = body.child("p:txBody").unwrap().children_named("a:p").collect();
        assert_eq!(paragraphs.len(), 2);
        assert_eq!(paragraph_text(paragraphs[0]), "A");
        assert_eq!(paragraphs[0].child("a:pPr").unwrap().attr("marL"), None);
        assert_eq!(paragraph_text(paragraphs[1]), "B");
        assert_eq!(paragraphs[1].child("a:pPr").unwrap().attr("marL"), Some("720000"));

        let logo = slide.shapes().find(|s| shape_name(s) == "Logo").unwrap();
        let rect = shape_rect(logo).unwrap();
        assert_eq!((rect.left, rect.top), (SLIDE_WIDTH - inches(2.0) - inches(0.3), 0));
        assert_eq!(slide.image_reference_count(), 1);

        assert!(pres.to_bytes().is_ok());
    }

    #[test]
    fn test_slide_count_with_and_without_stale_slide() {
        let entries: Vec<OutlineEntry> = (1..=3).map(|i| OutlineEntry::new(format!("T{}", i))).collect();

        let mut three = deck(3);
        populate(&mut three, &entries, &GenerateOptions::default()).unwrap();
        assert_eq!(three.slide_count(), entries.len() + 3 - 2);

        let mut two = deck(2);
        let report = populate(&mut two, &entries, &GenerateOptions::default()).unwrap();
        assert_eq!(two.slide_count(), entries.len() + 2 - 1);
        assert_eq!(report.removed.len(), 1);
        assert_eq!(report.generated, vec![1, 2, 3]);

        // Outline order is kept
        let titles: Vec<String> = two.slides()[1..]
            .iter()
            .map(|s| {
                let title = s.shapes().find(|sh| shape_name(sh) == "Title").unwrap();
                crate::shapes::shape_text(title).unwrap()
            })
            .collect();
        assert_eq!(titles, vec!["T1", "T2", "T3"]);

        let mut four = deck(4);
        populate(&mut four, &entries, &GenerateOptions::default()).unwrap();
        assert_eq!(four.slide_count(), entries.len() + 4 - 2);
    }

    #[test]
    fn test_single_slide_template_is_rejected() {
        let mut pres = deck(1);
        let err = populate(&mut pres, &[OutlineEntry::new("x")], &GenerateOptions::default()).unwrap_err();
        assert!(matches!(err, Error::TemplateError(_)));
        assert_eq!(pres.slide_count(), 1);
    }

    #[test]
    fn test_empty_outline_only_removes_template() {
        let mut pres = deck(3);
        let report = populate(&mut pres, &[], &GenerateOptions::default()).unwrap();
        assert!(report.generated.is_empty());
        assert_eq!(pres.slide_count(), 1);
    }
}
