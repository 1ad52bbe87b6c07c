//! `.prj` files and spatial reference ids.

use crate::error::{Result, ResultExt};
use std::borrow::Cow;
use std::path::Path;

/// Maps spatial reference ids to the WKT stored in `.prj` files.
pub trait CrsRegistry {
    fn wkt_for_srid(&self, srid: i32) -> Option<Cow<'_, str>>;
    fn srid_for_wkt(&self, wkt: &str) -> Option<i32>;
}

const WGS84: &str = r#"GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433],AUTHORITY["EPSG","4326"]]"#;

const WEB_MERCATOR: &str = r#"PROJCS["WGS_1984_Web_Mercator_Auxiliary_Sphere",GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]],PROJECTION["Mercator_Auxiliary_Sphere"],PARAMETER["False_Easting",0.0],PARAMETER["False_Northing",0.0],PARAMETER["Central_Meridian",0.0],PARAMETER["Standard_Parallel_1",0.0],PARAMETER["Auxiliary_Sphere_Type",0.0],UNIT["Meter",1.0],AUTHORITY["EPSG","3857"]]"#;

const LAMBERT_93: &str = r#"PROJCS["RGF93_Lambert_93",GEOGCS["GCS_RGF_1993",DATUM["D_RGF_1993",SPHEROID["GRS_1980",6378137.0,298.257222101]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]],PROJECTION["Lambert_Conformal_Conic"],PARAMETER["False_Easting",700000.0],PARAMETER["False_Northing",6600000.0],PARAMETER["Central_Meridian",3.0],PARAMETER["Standard_Parallel_1",49.0],PARAMETER["Standard_Parallel_2",44.0],PARAMETER["Latitude_Of_Origin",46.5],UNIT["Meter",1.0],AUTHORITY["EPSG","2154"]]"#;

/// Registry of a few common reference systems.
#[derive(Clone, Copy, Debug, Default)]
pub struct BuiltinCrsRegistry;

impl BuiltinCrsRegistry {
    const ENTRIES: [(i32, &'static str); 3] =
        [(4326, WGS84), (3857, WEB_MERCATOR), (2154, LAMBERT_93)];
}

fn normalized(wkt: &str) -> String {
    wkt.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_uppercase()
}

impl CrsRegistry for BuiltinCrsRegistry {
    fn wkt_for_srid(&self, srid: i32) -> Option<Cow<'_, str>> {
        Self::ENTRIES
            .iter()
            .find(|(code, _)| *code == srid)
            .map(|(_, wkt)| Cow::Borrowed(*wkt))
    }
    fn srid_for_wkt(&self, wkt: &str) -> Option<i32> {
        let wkt = normalized(wkt);
        Self::ENTRIES
            .iter()
            .find(|(_, known)| normalized(known) == wkt)
            .map(|(code, _)| *code)
    }
}

/// EPSG code of the outermost `AUTHORITY["EPSG","code"]` (or WKT2 `ID`) clause.
pub fn epsg_authority(wkt: &str) -> Option<i32> {
    let compact = normalized(wkt);
    ["AUTHORITY[\"EPSG\",", "ID[\"EPSG\","]
        .iter()
        .filter_map(|tag| compact.rfind(tag).map(|at| at + tag.len()))
        .max()
        .and_then(|start| {
            let code: String = compact[start..]
                .trim_start_matches('"')
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect();
            code.parse().ok()
        })
}

/// SRID of a `.prj` WKT: registry match, then EPSG authority, else 0.
pub fn srid_from_wkt(registry: &dyn CrsRegistry, wkt: &str) -> i32 {
    registry
        .srid_for_wkt(wkt)
        .or_else(|| epsg_authority(wkt))
        .unwrap_or(0)
}

pub fn read_prj(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }
    let wkt = std::fs::read_to_string(path).in_file(path)?;
    let wkt = wkt.trim();
    Ok(if wkt.is_empty() {
        None
    } else {
        Some(wkt.to_string())
    })
}

pub fn write_prj(path: &Path, wkt: &str) -> Result<()> {
    std::fs::write(path, wkt).in_file(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_lookup() {
        let registry = BuiltinCrsRegistry;
        let wkt = registry.wkt_for_srid(2154).unwrap();
        assert!(wkt.contains("Lambert_93"));
        assert_eq!(registry.srid_for_wkt(&wkt), Some(2154));
        assert_eq!(registry.wkt_for_srid(27572), None);
    }

    #[test]
    fn authority_fallback() {
        let wkt = r#"PROJCS["NTF (Paris) / Lambert zone II",
            GEOGCS["NTF (Paris)", AUTHORITY["EPSG","4807"]],
            UNIT["metre",1, AUTHORITY["EPSG","9001"]],
            AUTHORITY["EPSG","27572"]]"#;
        assert_eq!(epsg_authority(wkt), Some(27572));
        assert_eq!(srid_from_wkt(&BuiltinCrsRegistry, wkt), 27572);
        assert_eq!(
            epsg_authority(r#"PROJCRS["x",ID["EPSG",32631]]"#),
            Some(32631)
        );
        assert_eq!(srid_from_wkt(&BuiltinCrsRegistry, "LOCAL_CS[\"x\"]"), 0);
    }

    #[test]
    fn prj_files() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("a.prj");
        assert_eq!(read_prj(&path)?, None);
        write_prj(&path, WGS84)?;
        assert_eq!(read_prj(&path)?.as_deref(), Some(WGS84));
        Ok(())
    }
}
