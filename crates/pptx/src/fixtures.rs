//! Minimal in-memory PPTX packages for tests.

use crate::package::{content_type, rel_type};
use deck_core::Rect;
use std::io::{Cursor, Write};
use zip::write::FileOptions;
use zip::ZipWriter;

pub const SLIDE_WIDTH: i64 = 12_192_000;
pub const SLIDE_HEIGHT: i64 = 6_858_000;

const NAMESPACES: &str = r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main""#;

/// A PNG of the given size, optionally with a `pHYs` density in pixels per metre.
pub fn png_bytes(width: u32, height: u32, pixels_per_metre: Option<u32>) -> Vec<u8> {
    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, width, height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header().unwrap();
        if let Some(ppm) = pixels_per_metre {
            let mut phys = Vec::with_capacity(9);
            phys.extend_from_slice(&ppm.to_be_bytes());
            phys.extend_from_slice(&ppm.to_be_bytes());
            phys.push(1);
            writer.write_chunk(png::chunk::pHYs, &phys).unwrap();
        }
        let data = vec![0x80u8; (width * height * 4) as usize];
        writer.write_image_data(&data).unwrap();
    }
    out
}

/// A `p:sp` text box whose paragraphs each hold two runs.
pub fn text_shape(id: u32, name: &str, rect: Rect, paragraphs: &[&str]) -> String {
    let body: String = paragraphs
        .iter()
        .map(|text| {
            format!(
                r#"<a:p><a:pPr><a:buNone/></a:pPr><a:r><a:rPr lang="en-US" sz="2000" b="1"/><a:t>{}</a:t></a:r><a:r><a:rPr lang="en-US"/><a:t> (more)</a:t></a:r></a:p>"#,
                text
            )
        })
        .collect();
    format!(
        r#"<p:sp><p:nvSpPr><p:cNvPr id="{}" name="{}"/><p:cNvSpPr txBox="1"/><p:nvPr/></p:nvSpPr><p:spPr>{}<a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr><p:txBody><a:bodyPr/><a:lstStyle/>{}</p:txBody></p:sp>"#,
        id,
        name,
        xfrm(rect),
        body
    )
}

/// A `p:pic` embedding `rel_id`.
pub fn picture_shape(id: u32, name: &str, rel_id: &str, rect: Rect) -> String {
    format!(
        r#"<p:pic><p:nvPicPr><p:cNvPr id="{}" name="{}" descr="{} alt"/><p:cNvPicPr><a:picLocks noChangeAspect="1"/></p:cNvPicPr><p:nvPr/></p:nvPicPr><p:blipFill><a:blip r:embed="{}"/><a:stretch><a:fillRect/></a:stretch></p:blipFill><p:spPr>{}<a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr></p:pic>"#,
        id,
        name,
        name,
        rel_id,
        xfrm(rect)
    )
}

/// A custom-geometry `p:sp`, image-filled when `image_rel` is given.
pub fn freeform_shape(id: u32, name: &str, rect: Rect, image_rel: Option<&str>) -> String {
    let fill = match image_rel {
        Some(rel) => format!(
            r#"<a:blipFill><a:blip r:embed="{}"/><a:stretch><a:fillRect/></a:stretch></a:blipFill>"#,
            rel
        ),
        None => r#"<a:solidFill><a:srgbClr val="1F4E79"/></a:solidFill>"#.to_string(),
    };
    format!(
        r#"<p:sp><p:nvSpPr><p:cNvPr id="{}" name="{}"/><p:cNvSpPr/><p:nvPr/></p:nvSpPr><p:spPr>{}<a:custGeom><a:avLst/><a:gdLst/><a:ahLst/><a:cxnLst/><a:rect l="0" t="0" r="r" b="b"/><a:pathLst/></a:custGeom>{}</p:spPr></p:sp>"#,
        id,
        name,
        xfrm(rect),
        fill
    )
}

fn xfrm(rect: Rect) -> String {
    format!(
        r#"<a:xfrm><a:off x="{}" y="{}"/><a:ext cx="{}" cy="{}"/></a:xfrm>"#,
        rect.left, rect.top, rect.width, rect.height
    )
}

/// One slide of a fixture deck.
#[derive(Debug, Clone, Default)]
pub struct FixtureSlide {
    /// 1-based layout number.
    pub layout: usize,
    pub shapes: String,
    pub background: Option<String>,
    /// `(id, type, target, external)` in addition to the layout relationship.
    pub rels: Vec<(String, String, String, bool)>,
    /// Inner XML of the single notes paragraph.
    pub notes: Option<String>,
}

impl FixtureSlide {
    pub fn new(shapes: impl Into<String>) -> Self {
        Self {
            layout: 1,
            shapes: shapes.into(),
            ..Default::default()
        }
    }

    pub fn with_layout(mut self, layout: usize) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_background(mut self, bg: impl Into<String>) -> Self {
        self.background = Some(bg.into());
        self
    }

    /// Relate `id` to the deck's shared `image1.png`.
    pub fn with_image(mut self, id: &str) -> Self {
        self.rels.push((
            id.to_string(),
            rel_type::IMAGE.to_string(),
            "../media/image1.png".to_string(),
            false,
        ));
        self
    }

    pub fn with_hyperlink(mut self, id: &str, url: &str) -> Self {
        self.rels.push((id.to_string(), rel_type::HYPERLINK.to_string(), url.to_string(), true));
        self
    }

    pub fn with_notes(self, text: &str) -> Self {
        self.with_notes_lines(&[text])
    }

    /// Notes paragraph with soft line breaks between `lines`.
    pub fn with_notes_lines(mut self, lines: &[&str]) -> Self {
        let runs: Vec<String> = lines
            .iter()
            .map(|line| format!("<a:r><a:t>{}</a:t></a:r>", line))
            .collect();
        self.notes = Some(runs.join("<a:br/>"));
        self
    }
}

/// Options for a fixture deck.
#[derive(Debug, Clone)]
pub struct FixtureDeck {
    pub slides: Vec<FixtureSlide>,
    pub notes_master: bool,
    pub layout_names: Vec<String>,
    /// Bytes of `ppt/media/image1.png`.
    pub image: Vec<u8>,
}

impl FixtureDeck {
    pub fn new(slides: Vec<FixtureSlide>) -> Self {
        Self {
            slides,
            notes_master: true,
            layout_names: vec!["Title Slide".to_string(), "Title and Content".to_string()],
            image: png_bytes(4, 4, None),
        }
    }

    pub fn without_notes_master(mut self) -> Self {
        self.notes_master = false;
        self
    }

    pub fn with_layout_names(mut self, names: &[&str]) -> Self {
        self.layout_names = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut files: Vec<(String, Vec<u8>)> = Vec::new();
        let mut overrides = vec![
            ("/ppt/presentation.xml".to_string(), content_type::PRESENTATION),
            ("/ppt/slideMasters/slideMaster1.xml".to_string(), content_type::SLIDE_MASTER),
            ("/ppt/theme/theme1.xml".to_string(), content_type::THEME),
        ];

        files.push((
            "_rels/.rels".to_string(),
            rels(&[("rId1", rel_type::OFFICE_DOCUMENT, "ppt/presentation.xml", false)]),
        ));

        // Presentation
        let mut pres_rels: Vec<(String, &str, String, bool)> = vec![
            ("rId1".to_string(), rel_type::SLIDE_MASTER, "slideMasters/slideMaster1.xml".to_string(), false),
            ("rId2".to_string(), rel_type::THEME, "theme/theme1.xml".to_string(), false),
        ];
        if self.notes_master {
            pres_rels.push((
                "rId3".to_string(),
                rel_type::NOTES_MASTER,
                "notesMasters/notesMaster1.xml".to_string(),
                false,
            ));
        }
        let mut sld_ids = String::new();
        for (i, _) in self.slides.iter().enumerate() {
            let rel_id = format!("rId{}", 10 + i);
            sld_ids.push_str(&format!(r#"<p:sldId id="{}" r:id="{}"/>"#, 256 + i, rel_id));
            pres_rels.push((rel_id, rel_type::SLIDE, format!("slides/slide{}.xml", i + 1), false));
        }
        let notes_master_list = if self.notes_master {
            r#"<p:notesMasterIdLst><p:notesMasterId r:id="rId3"/></p:notesMasterIdLst>"#
        } else {
            ""
        };
        let sections = if self.slides.is_empty() {
            String::new()
        } else {
            let ids: String = (0..self.slides.len())
                .map(|i| format!(r#"<p14:sldId id="{}"/>"#, 256 + i))
                .collect();
            format!(
                r#"<p:extLst><p:ext uri="{{521415D9-36F7-43E2-AB2F-B90AF26B5E84}}"><p14:sectionLst xmlns:p14="http://schemas.microsoft.com/office/powerpoint/2010/main"><p14:section name="Default" id="{{00000000-0000-0000-0000-000000000001}}"><p14:sldIdLst>{}</p14:sldIdLst></p14:section></p14:sectionLst></p:ext></p:extLst>"#,
                ids
            )
        };
        files.push((
            "ppt/presentation.xml".to_string(),
            format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:presentation {}><p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/></p:sldMasterIdLst>{}<p:sldIdLst>{}</p:sldIdLst><p:sldSz cx="{}" cy="{}"/><p:notesSz cx="6858000" cy="9144000"/>{}</p:presentation>"#,
                NAMESPACES, notes_master_list, sld_ids, SLIDE_WIDTH, SLIDE_HEIGHT, sections
            )
            .into_bytes(),
        ));
        let pres_rel_refs: Vec<(&str, &str, &str, bool)> = pres_rels
            .iter()
            .map(|(id, ty, target, ext)| (id.as_str(), *ty, target.as_str(), *ext))
            .collect();
        files.push(("ppt/_rels/presentation.xml.rels".to_string(), rels(&pres_rel_refs)));

        // Master and layouts
        let layout_ids: String = (0..self.layout_names.len())
            .map(|i| format!(r#"<p:sldLayoutId id="{}" r:id="rId{}"/>"#, 2147483649u64 + i as u64, i + 1))
            .collect();
        files.push((
            "ppt/slideMasters/slideMaster1.xml".to_string(),
            format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:sldMaster {}><p:cSld>{}</p:cSld><p:clrMap bg1="lt1" tx1="dk1" bg2="lt2" tx2="dk2" accent1="accent1" accent2="accent2" accent3="accent3" accent4="accent4" accent5="accent5" accent6="accent6" hlink="hlink" folHlink="folHlink"/><p:sldLayoutIdLst>{}</p:sldLayoutIdLst></p:sldMaster>"#,
                NAMESPACES,
                empty_tree(),
                layout_ids
            )
            .into_bytes(),
        ));
        let layout_targets: Vec<String> = (0..self.layout_names.len())
            .map(|i| format!("../slideLayouts/slideLayout{}.xml", i + 1))
            .collect();
        let mut master_rels: Vec<(String, &str, &str, bool)> = layout_targets
            .iter()
            .enumerate()
            .map(|(i, target)| (format!("rId{}", i + 1), rel_type::SLIDE_LAYOUT, target.as_str(), false))
            .collect();
        master_rels.push((
            format!("rId{}", self.layout_names.len() + 1),
            rel_type::THEME,
            "../theme/theme1.xml",
            false,
        ));
        let master_rel_refs: Vec<(&str, &str, &str, bool)> = master_rels
            .iter()
            .map(|(id, ty, target, ext)| (id.as_str(), *ty, *target, *ext))
            .collect();
        files.push((
            "ppt/slideMasters/_rels/slideMaster1.xml.rels".to_string(),
            rels(&master_rel_refs),
        ));

        for (i, name) in self.layout_names.iter().enumerate() {
            let part = format!("ppt/slideLayouts/slideLayout{}.xml", i + 1);
            files.push((
                part.clone(),
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:sldLayout {}><p:cSld name="{}">{}</p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sldLayout>"#,
                    NAMESPACES,
                    name,
                    empty_tree()
                )
                .into_bytes(),
            ));
            files.push((
                format!("ppt/slideLayouts/_rels/slideLayout{}.xml.rels", i + 1),
                rels(&[("rId1", rel_type::SLIDE_MASTER, "../slideMasters/slideMaster1.xml", false)]),
            ));
            overrides.push((format!("/{}", part), content_type::SLIDE_LAYOUT));
        }

        files.push((
            "ppt/theme/theme1.xml".to_string(),
            br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><a:theme xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" name="Office Theme"/>"#.to_vec(),
        ));

        if self.notes_master {
            files.push((
                "ppt/notesMasters/notesMaster1.xml".to_string(),
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:notesMaster {}><p:cSld>{}</p:cSld><p:clrMap bg1="lt1" tx1="dk1" bg2="lt2" tx2="dk2" accent1="accent1" accent2="accent2" accent3="accent3" accent4="accent4" accent5="accent5" accent6="accent6" hlink="hlink" folHlink="folHlink"/></p:notesMaster>"#,
                    NAMESPACES,
                    empty_tree()
                )
                .into_bytes(),
            ));
            files.push((
                "ppt/notesMasters/_rels/notesMaster1.xml.rels".to_string(),
                rels(&[("rId1", rel_type::THEME, "../theme/theme1.xml", false)]),
            ));
            overrides.push(("/ppt/notesMasters/notesMaster1.xml".to_string(), content_type::NOTES_MASTER));
        }

        files.push(("ppt/media/image1.png".to_string(), self.image.clone()));

        // Slides
        for (i, slide) in self.slides.iter().enumerate() {
            let n = i + 1;
            let part = format!("ppt/slides/slide{}.xml", n);
            let background = slide.background.clone().unwrap_or_default();
            files.push((
                part.clone(),
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:sld {}><p:cSld>{}<p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/>{}<p:extLst><p:ext uri="{{BB962C8B-B14F-4D97-AF65-F5344CB8AC3E}}"><p14:creationId xmlns:p14="http://schemas.microsoft.com/office/powerpoint/2010/main" val="{}"/></p:ext></p:extLst></p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sld>"#,
                    NAMESPACES,
                    background,
                    slide.shapes,
                    1000 + n
                )
                .into_bytes(),
            ));
            overrides.push((format!("/{}", part), content_type::SLIDE));

            let layout_target = format!("../slideLayouts/slideLayout{}.xml", slide.layout.max(1));
            let notes_target = format!("../notesSlides/notesSlide{}.xml", n);
            let mut slide_rels: Vec<(&str, &str, &str, bool)> =
                vec![("rId1", rel_type::SLIDE_LAYOUT, layout_target.as_str(), false)];
            for (id, ty, target, external) in &slide.rels {
                slide_rels.push((id.as_str(), ty.as_str(), target.as_str(), *external));
            }

            if let Some(notes) = &slide.notes {
                slide_rels.push(("rId99", rel_type::NOTES_SLIDE, notes_target.as_str(), false));
                let notes_part = format!("ppt/notesSlides/notesSlide{}.xml", n);
                files.push((
                    notes_part.clone(),
                    format!(
                        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:notes {}><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/><p:sp><p:nvSpPr><p:cNvPr id="2" name="Notes Placeholder 1"/><p:cNvSpPr><a:spLocks noGrp="1"/></p:cNvSpPr><p:nvPr><p:ph type="body" idx="1"/></p:nvPr></p:nvSpPr><p:spPr/><p:txBody><a:bodyPr/><a:lstStyle/><a:p>{}</a:p></p:txBody></p:sp></p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:notes>"#,
                        NAMESPACES, notes
                    )
                    .into_bytes(),
                ));
                let slide_target = format!("../slides/slide{}.xml", n);
                let mut notes_rels = vec![("rId2", rel_type::SLIDE, slide_target.as_str(), false)];
                if self.notes_master {
                    notes_rels.insert(
                        0,
                        ("rId1", rel_type::NOTES_MASTER, "../notesMasters/notesMaster1.xml", false),
                    );
                }
                files.push((
                    format!("ppt/notesSlides/_rels/notesSlide{}.xml.rels", n),
                    rels(&notes_rels),
                ));
                overrides.push((format!("/{}", notes_part), content_type::NOTES_SLIDE));
            }

            files.push((format!("ppt/slides/_rels/slide{}.xml.rels", n), rels(&slide_rels)));
        }

        let override_xml: String = overrides
            .iter()
            .map(|(part, ct)| format!(r#"<Override PartName="{}" ContentType="{}"/>"#, part, ct))
            .collect();
        let content_types = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="{}"/><Default Extension="xml" ContentType="{}"/><Default Extension="png" ContentType="image/png"/>{}</Types>"#,
            content_type::RELATIONSHIPS,
            content_type::XML,
            override_xml
        );

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default();
        zip.start_file("[Content_Types].xml", options).unwrap();
        zip.write_all(content_types.as_bytes()).unwrap();
        for (name, data) in &files {
            zip.start_file(name.as_str(), options).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }
}

fn empty_tree() -> &'static str {
    r#"<p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/></p:spTree>"#
}

fn rels(entries: &[(&str, &str, &str, bool)]) -> Vec<u8> {
    let body: String = entries
        .iter()
        .map(|(id, ty, target, external)| {
            let mode = if *external { r#" TargetMode="External""# } else { "" };
            format!(r#"<Relationship Id="{}" Type="{}" Target="{}"{}/>"#, id, ty, target, mode)
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{}</Relationships>"#,
        body
    )
    .into_bytes()
}
