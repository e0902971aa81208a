//! Channel discovery from file names
//!
//! Every source image is named after the imaging round and the dye/marker it
//! carries. This module parses those names into canonical channel keys
//! (`<round>_<marker>`) and applies the round-selection policy that picks
//! exactly one source file per marker.

use std::collections::{BTreeMap, BTreeSet};

use lazy_static::lazy_static;
use log::{debug, info, warn};
use regex::Regex;

use crate::errors::{PrepError, PrepResult};

/// Marker name every DAPI variant is normalized to
pub const DAPI_MARKER: &str = "DAPI";

/// Channel key of the preferred DAPI round
const PREFERRED_DAPI_CHANNEL: &str = "001_DAPI";

lazy_static! {
    // <sample>_<round>.0.4_R000_<dye or marker>_<rest>.tif / .tiff
    static ref CHANNEL_FILE_PATTERN: Regex =
        Regex::new(r"^[^_]+_(\d+)\.0\.4_R000_([^_]+)_(.*)\.tif{1,2}")
            .expect("channel file pattern is a valid regex");
}

/// Mapping from marker name to the source file that backs it
///
/// Built once per run by [`scan_channels`] and never mutated afterwards.
/// Iteration order is the sorted marker order, so every consumer sees the
/// channels in the same sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelMap {
    entries: BTreeMap<String, String>,
}

impl ChannelMap {
    /// Build a channel map from `(channel, source)` pairs
    ///
    /// Later pairs replace earlier ones with the same channel name.
    pub fn from_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        ChannelMap {
            entries: entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    /// Source identifier of a channel
    pub fn get(&self, channel: &str) -> Option<&str> {
        self.entries.get(channel).map(String::as_str)
    }

    pub fn contains(&self, channel: &str) -> bool {
        self.entries.contains_key(channel)
    }

    /// Channel names in sorted order
    pub fn channels(&self) -> impl DoubleEndedIterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// `(channel, source)` pairs in sorted channel order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The set of channel names, used as the required channel set of a run
    pub fn channel_set(&self) -> BTreeSet<String> {
        self.entries.keys().cloned().collect()
    }
}

/// Round-selection and marker-filtering policy
///
/// `include_channels`/`exclude_channels` name channel keys such as
/// `002_CD3`; `use_markers`/`ignore_markers` name markers such as `CD3`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelSelection {
    pub include_channels: Vec<String>,
    pub exclude_channels: Vec<String>,
    pub use_markers: Vec<String>,
    pub ignore_markers: Vec<String>,
}

/// A source file that matched the channel naming pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedChannel {
    /// Imaging round
    pub round: u32,
    /// Normalized marker name
    pub marker: String,
}

impl ParsedChannel {
    /// Canonical channel key, e.g. `003_CD3`
    pub fn key(&self) -> String {
        channel_key(self.round, &self.marker)
    }
}

/// Format a canonical channel key from a round and marker
pub fn channel_key(round: u32, marker: &str) -> String {
    format!("{:03}_{}", round, marker)
}

/// Parse one file path into its round and marker
///
/// Returns `None` when the file name does not follow the naming pattern.
///
/// # Arguments
/// * `filepath` - Local or remote path; only the final component is inspected
pub fn parse_channel_file(filepath: &str) -> Option<ParsedChannel> {
    let fname = filepath.rsplit(|c| c == '/' || c == '\\').next().unwrap_or(filepath);

    let captures = CHANNEL_FILE_PATTERN.captures(fname)?;
    let round = captures.get(1)?.as_str().parse::<u32>().ok()?;
    let dye_or_marker = captures.get(2)?.as_str();

    let marker = if dye_or_marker.to_uppercase().contains(DAPI_MARKER) {
        DAPI_MARKER.to_string()
    } else {
        // <sample>_<round>_R000_<dye>_<marker-suffix>_...; drop the dye suffix
        let field = fname.split('_').nth(4).unwrap_or("");
        let segments: Vec<&str> = field.split('-').collect();
        if segments.len() > 1 {
            segments[..segments.len() - 1].join("-")
        } else {
            segments[0].to_string()
        }
    };

    if marker.is_empty() {
        debug!("Skipping {}: empty marker token", fname);
        return None;
    }

    Some(ParsedChannel { round, marker })
}

/// Build a channel map from a list of file identifiers
///
/// Files not matching the naming pattern are skipped. For every marker the
/// selection policy keeps exactly one round:
/// - rounds named in `include_channels` win outright (highest such round),
/// - otherwise rounds named in `exclude_channels` are dropped,
/// - `DAPI` keeps round `001` only, any other marker keeps its latest round.
///
/// `use_markers` and `ignore_markers` then restrict the result; unknown
/// markers only produce a warning.
///
/// # Arguments
/// * `files` - Paths to the per-channel source images
/// * `selection` - Include/exclude and marker filters
///
/// # Returns
/// The selected channels, or `EmptyResult` if no file could be parsed
pub fn scan_channels<S: AsRef<str>>(files: &[S], selection: &ChannelSelection) -> PrepResult<ChannelMap> {
    let mut discovered: BTreeMap<String, String> = BTreeMap::new();
    let mut grouped: BTreeMap<String, Vec<(u32, String)>> = BTreeMap::new();

    for file in files {
        let filepath = file.as_ref();
        let Some(parsed) = parse_channel_file(filepath) else {
            continue;
        };

        // a later file for the same round and marker replaces the earlier one
        let key = parsed.key();
        if discovered.insert(key.clone(), filepath.to_string()).is_none() {
            grouped.entry(parsed.marker.clone()).or_default().push((parsed.round, key));
        }
    }

    if discovered.is_empty() {
        let listed: Vec<&str> = files.iter().map(|f| f.as_ref()).collect();
        return Err(PrepError::EmptyResult(format!("{:?}", listed)));
    }

    info!("Discovered {} channels:", discovered.len());
    for (key, path) in &discovered {
        info!("{} <- {}", key, path);
    }

    let mut result: BTreeMap<String, String> = BTreeMap::new();

    for (marker, items) in grouped.iter_mut() {
        items.sort();

        let included: Vec<&String> = items
            .iter()
            .map(|(_, name)| name)
            .filter(|name| selection.include_channels.contains(*name))
            .collect();
        if let Some(name) = included.last() {
            result.insert(marker.clone(), discovered[*name].clone());
            continue;
        }

        let surviving: Vec<&(u32, String)> = items
            .iter()
            .filter(|(_, name)| !selection.exclude_channels.contains(name))
            .collect();
        if surviving.is_empty() {
            debug!("All rounds of {} excluded", marker);
            continue;
        }

        if marker.eq_ignore_ascii_case(DAPI_MARKER) {
            if surviving.iter().any(|(_, name)| name == PREFERRED_DAPI_CHANNEL) {
                result.insert(DAPI_MARKER.to_string(), discovered[PREFERRED_DAPI_CHANNEL].clone());
            } else {
                warn!("No {} round among DAPI candidates; DAPI not selected", PREFERRED_DAPI_CHANNEL);
            }
        } else if let Some((_, name)) = surviving.last() {
            result.insert(marker.clone(), discovered[name].clone());
        }
    }

    if !selection.use_markers.is_empty() {
        for marker in &selection.use_markers {
            if !result.contains_key(marker) {
                warn!("Requested use_marker '{}' not found.", marker);
            }
        }
        result.retain(|marker, _| selection.use_markers.contains(marker));
        info!("Restricting to use_markers = {:?}", selection.use_markers);
        info!("Final filtered channels: {:?}", result.keys().collect::<Vec<_>>());
    }

    if !selection.ignore_markers.is_empty() {
        for marker in &selection.ignore_markers {
            if !result.contains_key(marker) {
                warn!("Requested ignore_marker '{}' not found.", marker);
            }
        }
        result.retain(|marker, _| !selection.ignore_markers.contains(marker));
        info!("Ignoring markers = {:?}", selection.ignore_markers);
        info!("Final filtered channels: {:?}", result.keys().collect::<Vec<_>>());
    }

    let selected_files: BTreeSet<&String> = result.values().collect();
    let unused: Vec<(&String, &String)> = discovered
        .iter()
        .filter(|(_, path)| !selected_files.contains(path))
        .collect();

    info!("Final selected channels {}:", result.len());
    for (channel, path) in &result {
        info!("  Channel: {} <- {}", channel, path);
    }
    info!("OME-TIFF files not used in final channel selection {}:", unused.len());
    for (channel, path) in unused {
        info!("  Unused: Channel {} <- {}", channel, path);
    }

    Ok(ChannelMap { entries: result })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_rounds() -> Vec<&'static str> {
        vec![
            "p_001.0.4_R000_DAPI_xxx.ome.tif",
            "p_002.0.4_R000_dye_CD3-01_x.ome.tif",
            "p_003.0.4_R000_dye_CD3-02_x.ome.tif",
        ]
    }

    #[test]
    fn picks_latest_round_and_prefers_first_dapi() {
        let files = [
            "p_001.0.4_R000_DAPI_x.ome.tif",
            "p_002.0.4_R000_dye_CD3_x.ome.tif",
            "p_003.0.4_R000_dye_CD3_x.ome.tif",
            "p_004.0.4_R000_dye_CK7_x.ome.tif",
            "p_004.0.4_R000_DAPI_x.ome.tif",
        ];
        let map = scan_channels(&files, &ChannelSelection::default()).unwrap();

        assert_eq!(map.channels().collect::<Vec<_>>(), vec!["CD3", "CK7", "DAPI"]);
        assert_eq!(map.get("CD3"), Some("p_003.0.4_R000_dye_CD3_x.ome.tif"));
        assert_eq!(map.get("DAPI"), Some("p_001.0.4_R000_DAPI_x.ome.tif"));
    }

    #[test]
    fn include_keeps_named_round() {
        let selection = ChannelSelection {
            include_channels: vec!["002_CD3".to_string()],
            ..Default::default()
        };
        let map = scan_channels(&three_rounds(), &selection).unwrap();
        assert_eq!(map.get("CD3"), Some("p_002.0.4_R000_dye_CD3-01_x.ome.tif"));
    }

    #[test]
    fn exclude_falls_back_to_previous_round() {
        let selection = ChannelSelection {
            exclude_channels: vec!["003_CD3".to_string()],
            ..Default::default()
        };
        let map = scan_channels(&three_rounds(), &selection).unwrap();
        assert_eq!(map.get("CD3"), Some("p_002.0.4_R000_dye_CD3-01_x.ome.tif"));
    }

    #[test]
    fn include_beats_exclude_for_same_round() {
        let selection = ChannelSelection {
            include_channels: vec!["003_CD3".to_string()],
            exclude_channels: vec!["003_CD3".to_string()],
            ..Default::default()
        };
        let map = scan_channels(&three_rounds(), &selection).unwrap();
        assert_eq!(map.get("CD3"), Some("p_003.0.4_R000_dye_CD3-02_x.ome.tif"));
    }

    #[test]
    fn marker_filters_restrict_result() {
        let ignore = ChannelSelection {
            ignore_markers: vec!["CD3".to_string(), "NOPE".to_string()],
            ..Default::default()
        };
        let map = scan_channels(&three_rounds(), &ignore).unwrap();
        assert!(!map.contains("CD3"));
        assert!(map.contains("DAPI"));

        let only_dapi = ChannelSelection {
            use_markers: vec!["DAPI".to_string()],
            ..Default::default()
        };
        let map = scan_channels(&three_rounds(), &only_dapi).unwrap();
        assert_eq!(map.channels().collect::<Vec<_>>(), vec!["DAPI"]);
    }

    #[test]
    fn dapi_without_first_round_is_dropped() {
        let files = [
            "p_002.0.4_R000_DAPI_x.ome.tif",
            "p_003.0.4_R000_dye_CD8-AF488_x.ome.tif",
        ];
        let map = scan_channels(&files, &ChannelSelection::default()).unwrap();
        assert!(!map.contains("DAPI"));
        assert_eq!(map.get("CD8"), Some("p_003.0.4_R000_dye_CD8-AF488_x.ome.tif"));
    }

    #[test]
    fn first_dapi_preferred_even_when_later_round_survives() {
        let files = [
            "p_001.0.4_R000_dapi_x.ome.tif",
            "p_009.0.4_R000_DAPI_x.ome.tif",
        ];
        let map = scan_channels(&files, &ChannelSelection::default()).unwrap();
        assert_eq!(map.get("DAPI"), Some("p_001.0.4_R000_dapi_x.ome.tif"));
    }

    #[test]
    fn unmatched_files_give_empty_result() {
        let files = ["notes.txt", "slide_overview.tif", "p_1.0.3_R000_DAPI_x.tif"];
        let err = scan_channels(&files, &ChannelSelection::default()).unwrap_err();
        assert!(matches!(err, PrepError::EmptyResult(_)));
    }

    #[test]
    fn parses_remote_paths_and_hyphenated_markers() {
        let parsed = parse_channel_file("/remote/run/p_012.0.4_R000_Cy5_PD-L1-AF647_F.ome.tiff").unwrap();
        assert_eq!(parsed.round, 12);
        assert_eq!(parsed.marker, "PD-L1");
        assert_eq!(parsed.key(), "012_PD-L1");
    }

    #[test]
    fn later_file_for_same_key_wins() {
        let files = [
            "p_002.0.4_R000_dye_CD3-01_first.ome.tif",
            "p_002.0.4_R000_dye_CD3-01_second.ome.tif",
        ];
        let map = scan_channels(&files, &ChannelSelection::default()).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("CD3"), Some("p_002.0.4_R000_dye_CD3-01_second.ome.tif"));
    }

    #[test]
    fn channels_iterate_from_both_ends() {
        let map = ChannelMap::from_entries([("DAPI", "a.tif"), ("CD3", "b.tif"), ("CK7", "c.tif")]);
        assert_eq!(map.channels().collect::<Vec<_>>(), vec!["CD3", "CK7", "DAPI"]);
        assert_eq!(map.channels().rev().collect::<Vec<_>>(), vec!["DAPI", "CK7", "CD3"]);
    }
}
