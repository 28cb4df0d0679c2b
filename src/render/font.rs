use std::fs;

use ab_glyph::FontArc;
use anyhow::{Context, Result, anyhow};
use fontdb::{Database, Family, Query, Source};

const PREFERRED_FAMILIES: &[&str] = &["DejaVu Sans", "Noto Sans", "Liberation Sans", "FreeSans"];

/// First usable sans-serif face installed on the system.
pub fn load_system_font() -> Result<FontArc> {
    let mut db = Database::new();
    db.load_system_fonts();

    let families = PREFERRED_FAMILIES
        .iter()
        .map(|name| Family::Name(*name))
        .chain(std::iter::once(Family::SansSerif));
    for family in families {
        if let Some(id) = db.query(&Query {
            families: &[family],
            ..Default::default()
        }) && let Some(font) = load_face(&db, id)?
        {
            return Ok(font);
        }
    }

    for face in db.faces() {
        if let Some(font) = load_face(&db, face.id)? {
            return Ok(font);
        }
    }

    Err(anyhow!("no usable system font found"))
}

fn load_face(db: &Database, id: fontdb::ID) -> Result<Option<FontArc>> {
    let face = db.face(id).context("missing font face in database")?;
    let data = match &face.source {
        Source::Binary(data) => data.as_ref().as_ref().to_vec(),
        Source::File(path) => fs::read(path)
            .with_context(|| format!("failed to read font at {}", path.display()))?,
        Source::SharedFile(_, data) => data.as_ref().as_ref().to_vec(),
    };
    // Collections (.ttc) that ab_glyph cannot open are skipped, not fatal.
    Ok(FontArc::try_from_vec(data).ok())
}
