//! Layers a filter tree is applied to
//!
//! - [`LocalEvaluationSink`]: client-side features, re-evaluated on every
//!   event so dragging a shape filters the layer live
//! - [`RemoteQuerySink`]: a server-side layer, re-queried only on terminal
//!   events; the latest payload is published for the dispatcher

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::watch;

use crate::config::FilterConfig;
use crate::domain::{Crs, Feature, Reproject, features_from_geojson};
use crate::error::Result;
use crate::evaluate::Evaluator;
use crate::filter::FilterTree;
use crate::serialize::{
    QueryDocument, QueryOptions, get_feature_body, serialize_structured, serialize_text,
};

/// A layer that follows the session's filter tree
pub trait LayerSink: Send {
    fn name(&self) -> &str;

    /// Bring the layer in line with `tree`
    ///
    /// `is_terminal` is false for intermediate translate events; sinks that
    /// only follow completed interactions ignore those.
    fn apply_filter(&mut self, tree: &FilterTree, is_terminal: bool) -> Result<()>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

// ============================================================================
// Local evaluation
// ============================================================================

/// Candidate features with one visibility flag each
pub struct LocalEvaluationSink {
    name: String,
    features: Vec<Feature>,
    visible: Vec<bool>,
    applications: usize,
    reprojector: Arc<dyn Reproject>,
}

impl LocalEvaluationSink {
    /// All features start visible
    pub fn new(
        name: impl Into<String>,
        features: Vec<Feature>,
        reprojector: Arc<dyn Reproject>,
    ) -> Self {
        let visible = vec![true; features.len()];
        Self {
            name: name.into(),
            features,
            visible,
            applications: 0,
            reprojector,
        }
    }

    /// Load candidates from a GeoJSON document, e.g. a WFS response body
    pub fn from_geojson(
        name: impl Into<String>,
        geojson: &str,
        crs: &Crs,
        reprojector: Arc<dyn Reproject>,
    ) -> Result<Self> {
        let features = features_from_geojson(geojson, crs)?;
        Ok(Self::new(name, features, reprojector))
    }

    /// Restyle every feature by `pass`
    pub fn apply<F>(&mut self, pass: F)
    where
        F: Fn(&Feature) -> bool,
    {
        for (feature, visible) in self.features.iter().zip(self.visible.iter_mut()) {
            *visible = pass(feature);
        }
        self.applications += 1;
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn visible(&self) -> &[bool] {
        &self.visible
    }

    /// Ids of the features currently shown
    pub fn visible_ids(&self) -> Vec<&str> {
        self.features
            .iter()
            .zip(&self.visible)
            .filter(|(_, shown)| **shown)
            .map(|(feature, _)| feature.id.as_str())
            .collect()
    }

    /// Number of times the layer was restyled
    pub fn applications(&self) -> usize {
        self.applications
    }
}

impl LayerSink for LocalEvaluationSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply_filter(&mut self, tree: &FilterTree, _is_terminal: bool) -> Result<()> {
        let reprojector = self.reprojector.clone();
        let evaluator = Evaluator::new(reprojector.as_ref());
        let name = self.name.clone();

        self.apply(|feature| match evaluator.evaluate(tree, feature) {
            Ok(pass) => pass,
            Err(err) => {
                log::warn!("{name}: hiding feature {} that cannot be evaluated: {err}", feature.id);
                false
            }
        });
        log::debug!("{name}: filter applied ({} groups)", tree.len());
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ============================================================================
// Remote queries
// ============================================================================

/// Query language a remote layer understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    /// CQL text sent as a tile request parameter
    Text,
    /// Structured document sent as a feature request body
    Structured,
}

/// Serialized filter handed to a remote layer; `None` means no filter
#[derive(Debug, Clone, PartialEq)]
pub enum QueryPayload {
    Text(Option<String>),
    Document(Option<QueryDocument>),
}

impl QueryPayload {
    pub fn is_unfiltered(&self) -> bool {
        matches!(self, QueryPayload::Text(None) | QueryPayload::Document(None))
    }
}

/// Server-side layer holding the last query sent to it
pub struct RemoteQuerySink {
    name: String,
    mode: QueryMode,
    options: QueryOptions,
    config: FilterConfig,
    reprojector: Arc<dyn Reproject>,
    tile_params: BTreeMap<String, String>,
    last_payload: Option<QueryPayload>,
    applications: usize,
    updates: watch::Sender<Option<QueryPayload>>,
}

impl RemoteQuerySink {
    /// Tile layer filtered with CQL written in the layer's projection
    pub fn text(name: impl Into<String>, config: &FilterConfig, reprojector: Arc<dyn Reproject>) -> Self {
        Self::new(name, QueryMode::Text, config.query_options(), config, reprojector)
    }

    /// Feature layer filtered with query documents written in the view
    /// projection
    pub fn structured(
        name: impl Into<String>,
        config: &FilterConfig,
        reprojector: Arc<dyn Reproject>,
    ) -> Self {
        Self::new(name, QueryMode::Structured, config.document_options(), config, reprojector)
    }

    pub fn new(
        name: impl Into<String>,
        mode: QueryMode,
        options: QueryOptions,
        config: &FilterConfig,
        reprojector: Arc<dyn Reproject>,
    ) -> Self {
        let tile_params = BTreeMap::from([
            ("LAYERS".to_string(), config.layer.layer_name.clone()),
            ("TILED".to_string(), "true".to_string()),
            ("TRANSPARENT".to_string(), "true".to_string()),
            ("VERSION".to_string(), config.wms_version.clone()),
            ("STYLES".to_string(), config.wms_style.clone()),
        ]);

        Self {
            name: name.into(),
            mode,
            options,
            config: config.clone(),
            reprojector,
            tile_params,
            last_payload: None,
            applications: 0,
            updates: watch::Sender::new(None),
        }
    }

    pub fn mode(&self) -> QueryMode {
        self.mode
    }

    /// Make `payload` the live query of this layer
    pub fn apply(&mut self, payload: QueryPayload) {
        if let QueryPayload::Text(cql) = &payload {
            match cql {
                Some(cql) => {
                    self.tile_params.insert("CQL_FILTER".to_string(), cql.clone());
                }
                None => {
                    self.tile_params.remove("CQL_FILTER");
                }
            }
        }

        self.last_payload = Some(payload.clone());
        self.applications += 1;
        self.updates.send_replace(Some(payload));
    }

    pub fn last_payload(&self) -> Option<&QueryPayload> {
        self.last_payload.as_ref()
    }

    /// Number of queries made live
    pub fn applications(&self) -> usize {
        self.applications
    }

    /// WMS parameters of the tile layer, with `CQL_FILTER` while filtered
    pub fn tile_params(&self) -> &BTreeMap<String, String> {
        &self.tile_params
    }

    /// WFS `GetFeature` body for the live query
    pub fn request_body(&self) -> String {
        let filter = match &self.last_payload {
            Some(QueryPayload::Document(doc)) => doc.as_ref(),
            _ => None,
        };
        get_feature_body(&self.config.layer, filter, self.options.decimals)
    }

    /// Receiver of every payload made live, latest value wins
    pub fn subscribe(&self) -> watch::Receiver<Option<QueryPayload>> {
        self.updates.subscribe()
    }

    fn serialize(&self, tree: &FilterTree) -> Result<QueryPayload> {
        let reprojector = self.reprojector.as_ref();
        Ok(match self.mode {
            QueryMode::Text => QueryPayload::Text(serialize_text(tree, &self.options, reprojector)?),
            QueryMode::Structured => {
                QueryPayload::Document(serialize_structured(tree, &self.options, reprojector)?)
            }
        })
    }
}

impl LayerSink for RemoteQuerySink {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply_filter(&mut self, tree: &FilterTree, is_terminal: bool) -> Result<()> {
        if !is_terminal {
            return Ok(());
        }

        let payload = self.serialize(tree)?;
        log::debug!("{}: query updated: {:?}", self.name, payload);
        self.apply(payload);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Shape, WebMercator};
    use crate::filter::{FilterGroup, Operand, Predicate};
    use geo_types::{Geometry, Point};

    fn reprojector() -> Arc<dyn Reproject> {
        Arc::new(WebMercator)
    }

    fn dwithin_tree() -> FilterTree {
        let mut tree = FilterTree::new(Crs::wgs84());
        let shape = Arc::new(Shape::point(-100.0, 40.0, Crs::wgs84()).unwrap());
        tree.add_group(FilterGroup::single(
            Predicate::new(Operand::DistanceWithin, shape, Some(500_000.0)).unwrap(),
        ));
        tree
    }

    fn local() -> LocalEvaluationSink {
        let features = vec![
            Feature::new("near", Geometry::Point(Point::new(-100.0, 41.0)), Crs::wgs84()),
            Feature::new("far", Geometry::Point(Point::new(-80.0, 40.0)), Crs::wgs84()),
        ];
        LocalEvaluationSink::new("local", features, reprojector())
    }

    #[test]
    fn test_local_sink_filters_every_event() {
        let mut sink = local();
        assert_eq!(sink.visible(), &[true, true]);

        sink.apply_filter(&dwithin_tree(), false).unwrap();
        assert_eq!(sink.visible(), &[true, false]);
        sink.apply_filter(&FilterTree::new(Crs::wgs84()), true).unwrap();
        assert_eq!(sink.visible(), &[true, true]);
        assert_eq!(sink.applications(), 2);
    }

    #[test]
    fn test_local_sink_hides_unevaluable_feature() {
        let features = vec![
            Feature::new("ok", Geometry::Point(Point::new(-100.0, 40.5)), Crs::wgs84()),
            Feature::new("foreign", Geometry::Point(Point::new(1.0, 1.0)), Crs::new("EPSG:2154")),
        ];
        let mut sink = LocalEvaluationSink::new("local", features, reprojector());
        sink.apply_filter(&dwithin_tree(), true).unwrap();
        assert_eq!(sink.visible_ids(), vec!["ok"]);
    }

    #[test]
    fn test_remote_sink_ignores_intermediate_events() {
        let mut sink = RemoteQuerySink::text("tiles", &FilterConfig::default(), reprojector());
        sink.apply_filter(&dwithin_tree(), false).unwrap();
        assert_eq!(sink.applications(), 0);
        assert_eq!(sink.last_payload(), None);
        assert!(!sink.tile_params().contains_key("CQL_FILTER"));
    }

    #[test]
    fn test_remote_text_sink_sets_cql_filter() {
        let mut sink = RemoteQuerySink::text("tiles", &FilterConfig::default(), reprojector());
        sink.apply_filter(&dwithin_tree(), true).unwrap();

        let expected = "(DWITHIN(the_geom, POINT(-100 40), 500000, meters))";
        assert_eq!(
            sink.last_payload(),
            Some(&QueryPayload::Text(Some(expected.to_string())))
        );
        assert_eq!(sink.tile_params()["CQL_FILTER"], expected);
        assert_eq!(sink.tile_params()["LAYERS"], "topp:states");
        assert_eq!(sink.tile_params()["VERSION"], "1.1.1");

        sink.apply_filter(&FilterTree::new(Crs::wgs84()), true).unwrap();
        assert_eq!(sink.last_payload(), Some(&QueryPayload::Text(None)));
        assert!(!sink.tile_params().contains_key("CQL_FILTER"));
    }

    #[test]
    fn test_remote_sink_idempotent() {
        let mut sink = RemoteQuerySink::structured("features", &FilterConfig::default(), reprojector());
        let tree = dwithin_tree();
        sink.apply_filter(&tree, true).unwrap();
        let first = sink.last_payload().cloned();
        sink.apply_filter(&tree, true).unwrap();
        assert_eq!(sink.last_payload().cloned(), first);
        assert_eq!(sink.applications(), 2);
        assert!(matches!(first, Some(QueryPayload::Document(Some(_)))));
    }

    #[test]
    fn test_structured_request_body() {
        let mut sink = RemoteQuerySink::structured("features", &FilterConfig::default(), reprojector());
        assert!(!sink.request_body().contains("ogc:Filter"));
        sink.apply_filter(&dwithin_tree(), true).unwrap();
        let body = sink.request_body();
        assert!(body.contains(r#"srsName="EPSG:3857""#));
        assert!(body.contains("<ogc:DWithin>"));
    }

    #[test]
    fn test_subscribers_see_latest_payload() {
        let mut sink = RemoteQuerySink::text("tiles", &FilterConfig::default(), reprojector());
        let mut rx = sink.subscribe();
        assert!(!rx.has_changed().unwrap());

        sink.apply(QueryPayload::Text(Some("A".into())));
        sink.apply(QueryPayload::Text(Some("B".into())));
        assert!(rx.has_changed().unwrap());
        assert_eq!(
            *rx.borrow_and_update(),
            Some(QueryPayload::Text(Some("B".into())))
        );
    }

    #[test]
    fn test_reprojection_failure_keeps_last_payload() {
        let mut config = FilterConfig::default();
        config.layer.projection = Crs::new("EPSG:2154");
        let mut sink = RemoteQuerySink::text("tiles", &config, reprojector());
        assert!(sink.apply_filter(&dwithin_tree(), true).is_err());
        assert_eq!(sink.last_payload(), None);
        assert_eq!(sink.applications(), 0);
    }
}
