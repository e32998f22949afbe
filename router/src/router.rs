use crate::algo::diff_pair_placer::DiffPairPlacer;
use crate::algo::dragger::Dragger;
use crate::algo::line_placer::LinePlacer;
use crate::algo::meander_placer::MeanderPlacer;
use crate::algo::{FixOutcome, PlacementAlgo, TuningStatus};
use crate::error::{Failure, RouterError};
use crate::iface::{PreviewColor, RouterIface};
use crate::item::{Item, ItemId};
use crate::node::Node;
use crate::sizes::SizesSettings;
use pns_common::db::indices::{BoardItemRef, NetId};
use pns_common::geom::{IPoint, Rect};
use pns_common::util::config::{Config, RoutingConfig, TuningConfig};
use pns_common::util::profiler::ScopedTimer;
use std::collections::BTreeSet;
use std::rc::Rc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouterMode {
    RouteSingle,
    RouteDiffPair,
    TuneSingle,
    TuneDiffPair,
    TuneDiffPairSkew,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouterState {
    Idle,
    RouteTrack,
    DragSegment,
}

/// Interactive router session over one host.
///
/// The router owns the committed world and at most one placement
/// algorithm, which in turn owns the open trial branch. All operations
/// report failure through their return value and [`Router::failure_reason`].
pub struct Router<I: RouterIface> {
    iface: I,
    world: Option<Rc<Node>>,
    state: RouterState,
    mode: RouterMode,
    placer: Option<Box<dyn PlacementAlgo>>,
    settings: RoutingConfig,
    tuning: TuningConfig,
    sizes: SizesSettings,
    layer: u8,
    failure: Option<Failure>,
}

impl<I: RouterIface> Router<I> {
    pub fn new(iface: I, config: &Config) -> Self {
        Self {
            iface,
            world: None,
            state: RouterState::Idle,
            mode: RouterMode::RouteSingle,
            placer: None,
            settings: config.routing.clone(),
            tuning: config.tuning.clone(),
            sizes: SizesSettings::from(&config.sizes),
            layer: 0,
            failure: None,
        }
    }

    /// Rebuilds the world from the host, dropping any operation in progress.
    pub fn sync_world(&mut self) -> Result<(), RouterError> {
        let _timer = ScopedTimer::new("sync_world");
        self.clear_world();
        let mut world = Node::new();
        self.iface.sync_world(&mut world).map_err(RouterError::Sync)?;
        log::debug!("world holds {} items", world.item_count());
        self.world = Some(Rc::new(world));
        Ok(())
    }

    pub fn clear_world(&mut self) {
        self.stop_routing();
        self.world = None;
    }

    /// # Panics
    /// Before the first successful [`Router::sync_world`].
    pub fn world(&self) -> &Rc<Node> {
        match &self.world {
            Some(w) => w,
            None => panic!("router used before sync_world"),
        }
    }

    fn world_mut(&mut self) -> &mut Rc<Node> {
        match &mut self.world {
            Some(w) => w,
            None => panic!("router used before sync_world"),
        }
    }

    pub fn iface(&self) -> &I {
        &self.iface
    }

    pub fn iface_mut(&mut self) -> &mut I {
        &mut self.iface
    }

    pub fn state(&self) -> RouterState {
        self.state
    }

    pub fn mode(&self) -> RouterMode {
        self.mode
    }

    /// Takes effect on the next `start_routing`.
    pub fn set_mode(&mut self, mode: RouterMode) {
        self.mode = mode;
    }

    pub fn routing_in_progress(&self) -> bool {
        self.state != RouterState::Idle
    }

    fn fail(&mut self, failure: Failure) -> bool {
        log::debug!("router: {}", failure);
        self.failure = Some(failure);
        false
    }

    pub fn start_routing(&mut self, p: IPoint, item: Option<&Item>, layer: u8) -> bool {
        let world = Rc::clone(self.world());
        self.stop_routing();
        self.failure = None;

        if let Some(net) = item.and_then(Item::net) {
            if let Some(ns) = self.iface.net_sizes(Some(net)) {
                self.sizes.apply_net_sizes(&ns);
            }
        }
        let layer_count = self.iface.layer_count();

        let placer: Result<Box<dyn PlacementAlgo>, Failure> = match self.mode {
            RouterMode::RouteSingle => {
                LinePlacer::start(&world, p, item, layer, layer_count, &self.settings, &self.sizes)
                    .map(|pl| Box::new(pl) as Box<dyn PlacementAlgo>)
            }
            RouterMode::RouteDiffPair => {
                DiffPairPlacer::start(&world, p, item, layer, layer_count, &self.settings, &self.sizes)
                    .map(|pl| Box::new(pl) as Box<dyn PlacementAlgo>)
            }
            RouterMode::TuneSingle => MeanderPlacer::start(&world, item, &self.tuning)
                .map(|pl| Box::new(pl) as Box<dyn PlacementAlgo>),
            RouterMode::TuneDiffPair | RouterMode::TuneDiffPairSkew => {
                Err(Failure::UnsupportedMode("differential pair tuning"))
            }
        };

        match placer {
            Ok(placer) => {
                log::info!("start routing at {:?} ({:?})", p, self.mode);
                self.layer = placer.current_layer();
                self.placer = Some(placer);
                self.state = RouterState::RouteTrack;
                true
            }
            Err(f) => self.fail(f),
        }
    }

    pub fn start_dragging(&mut self, p: IPoint, item: &Item) -> bool {
        let world = Rc::clone(self.world());
        self.stop_routing();
        self.failure = None;

        match Dragger::start(&world, p, item, &self.settings) {
            Ok(dragger) => {
                log::info!("start dragging {} at {:?}", item.kind().name(), p);
                self.placer = Some(Box::new(dragger));
                self.state = RouterState::DragSegment;
                true
            }
            Err(f) => self.fail(f),
        }
    }

    pub fn move_to(&mut self, p: IPoint, item: Option<&Item>) -> bool {
        let _timer = ScopedTimer::with_level("move", log::Level::Trace);
        let world = Rc::clone(self.world());
        let Some(placer) = self.placer.as_mut() else {
            return false;
        };
        let res = placer.move_to(&world, p, item);
        drop(world);
        self.update_view();
        match res {
            Ok(()) => {
                self.failure = None;
                true
            }
            Err(f) => self.fail(f),
        }
    }

    /// Pushes the trial change-set to the preview: removed items are hidden,
    /// added items drawn, violated obstacles highlighted.
    fn update_view(&mut self) {
        self.iface.erase_view();
        let Some(placer) = self.placer.as_ref() else {
            return;
        };
        let Some(trial) = placer.trial() else {
            return;
        };
        let changes = trial.changes();
        for (_, item) in &changes.removed {
            self.iface.hide_item(item);
        }
        for (_, item) in &changes.added {
            let clearance = trial.net_clearance(item.net());
            self.iface.display_item(item, PreviewColor::Normal, clearance);
        }
        for &id in placer.violations() {
            if let Some(item) = trial.item(id) {
                let clearance = trial.net_clearance(item.net());
                self.iface.display_item(item, PreviewColor::Violation, clearance);
            }
        }
    }

    /// Commits the current trial. Returns `Ok(false)` when the placement
    /// algorithm refused to fix (see [`Router::failure_reason`]).
    pub fn fix_route(&mut self, p: IPoint, item: Option<&Item>) -> Result<bool, RouterError> {
        let world = Rc::clone(self.world());
        let Some(placer) = self.placer.as_mut() else {
            return Ok(false);
        };
        let outcome = placer.fix_route(&world, p, item);
        drop(world);

        let outcome = match outcome {
            Ok(o) => o,
            Err(f) => {
                self.update_view();
                return Ok(self.fail(f));
            }
        };

        self.commit_trial()?;
        self.failure = None;
        match outcome {
            FixOutcome::Finished => {
                log::info!("route finished");
                self.stop_routing();
            }
            FixOutcome::Continue => {
                let world = Rc::clone(self.world());
                if let Some(placer) = self.placer.as_mut() {
                    placer.continue_from(&world);
                    self.layer = placer.current_layer();
                }
            }
        }
        Ok(true)
    }

    fn commit_trial(&mut self) -> Result<(), RouterError> {
        let Some(placer) = self.placer.as_mut() else {
            return Ok(());
        };
        let Some(mut trial) = placer.take_trial() else {
            return Ok(());
        };
        let changes = trial.changes();
        if changes.is_empty() {
            return Ok(());
        }

        for (_, item) in &changes.removed {
            self.iface.remove_item(item);
        }
        let handles: Vec<(ItemId, Option<BoardItemRef>)> = changes
            .added
            .iter()
            .map(|(id, item)| (*id, self.iface.add_item(item)))
            .collect();

        if let Err(e) = self.iface.commit() {
            placer.restore_trial(trial);
            self.failure = Some(Failure::CommitRejected);
            return Err(RouterError::Commit(e));
        }

        for (id, handle) in handles {
            trial.set_parent(id, handle);
        }
        let nets: BTreeSet<NetId> = changes
            .removed
            .iter()
            .chain(&changes.added)
            .filter_map(|(_, item)| item.net())
            .collect();
        for net in nets {
            self.iface.update_net(net);
        }

        log::info!(
            "committed {} removed / {} added items",
            changes.removed.len(),
            changes.added.len()
        );
        Node::merge(self.world_mut(), trial);
        Ok(())
    }

    /// Cancels the current operation, discarding its trial.
    pub fn stop_routing(&mut self) {
        if self.placer.take().is_some() {
            log::debug!("routing stopped");
            self.iface.erase_view();
        }
        self.state = RouterState::Idle;
    }

    pub fn flip_posture(&mut self) {
        let world = Rc::clone(self.world());
        if let Some(placer) = self.placer.as_mut() {
            placer.flip_posture(&world);
        }
        drop(world);
        self.update_view();
    }

    pub fn switch_layer(&mut self, layer: u8) -> bool {
        if layer >= self.iface.layer_count() {
            return self.fail(Failure::InvalidLayer(layer));
        }
        let world = Rc::clone(self.world());
        let res = match self.placer.as_mut() {
            Some(placer) => placer.set_layer(&world, layer),
            None => Ok(()),
        };
        drop(world);
        match res {
            Ok(()) => {
                self.layer = layer;
                self.update_view();
                true
            }
            Err(f) => self.fail(f),
        }
    }

    pub fn toggle_via_placement(&mut self) -> bool {
        let world = Rc::clone(self.world());
        let toggled = self.placer.as_mut().is_some_and(|p| p.toggle_via(&world));
        drop(world);
        self.update_view();
        toggled
    }

    pub fn is_placing_via(&self) -> bool {
        self.placer.as_ref().is_some_and(|p| p.is_placing_via())
    }

    pub fn set_ortho_mode(&mut self, orthogonal: bool) {
        self.settings.orthogonal = orthogonal;
        if let Some(placer) = self.placer.as_mut() {
            placer.set_orthogonal(orthogonal);
        }
    }

    pub fn enable_snapping(&mut self, enable: bool) {
        self.settings.snap_to_items = enable;
    }

    pub fn set_iter_limit(&mut self, limit: usize) {
        self.settings.iteration_limit = limit;
    }

    pub fn iter_limit(&self) -> usize {
        self.settings.iteration_limit
    }

    pub fn load_settings(&mut self, settings: &RoutingConfig) {
        self.settings = settings.clone();
    }

    pub fn settings(&self) -> &RoutingConfig {
        &self.settings
    }

    pub fn load_tuning(&mut self, tuning: &TuningConfig) {
        self.tuning = tuning.clone();
    }

    pub fn update_sizes(&mut self, sizes: &SizesSettings) {
        self.sizes = sizes.clone();
        if let Some(placer) = self.placer.as_mut() {
            placer.update_sizes(sizes);
        }
    }

    pub fn sizes(&self) -> &SizesSettings {
        &self.sizes
    }

    pub fn get_clearance(&self, a: &Item, b: &Item) -> i64 {
        self.world().clearance(a, b)
    }

    /// Committed items whose copper covers `p`.
    pub fn query_hover_items(&self, p: IPoint) -> Vec<ItemId> {
        let world = self.world();
        world
            .query_area(Rect::new(p, p))
            .into_iter()
            .filter(|&id| {
                world
                    .item(id)
                    .and_then(Item::shape)
                    .is_some_and(|s| s.contains_point(p))
            })
            .collect()
    }

    /// Point on `item` the cursor at `p` attaches to: an end point within the
    /// snap radius, else the nearest point of a track, else the item origin.
    pub fn snap_to_item(&self, item: Option<&Item>, p: IPoint) -> IPoint {
        let Some(item) = item else {
            return p;
        };
        if !self.settings.snap_to_items {
            return p;
        }
        match item {
            Item::Solid(s) => s.pos,
            Item::Via(v) => v.pos,
            Item::Segment(s) => [s.seg.a, s.seg.b]
                .into_iter()
                .filter(|a| a.distance(p) <= self.settings.snap_radius as f64)
                .min_by_key(|a| (*a - p).squared_length())
                .unwrap_or_else(|| s.seg.nearest_point(p)),
            Item::Line(l) => l
                .chain()
                .nearest_segment(p)
                .map_or(p, |i| l.chain().segment(i).nearest_point(p)),
        }
    }

    pub fn query_item_by_parent(&self, handle: BoardItemRef) -> Option<ItemId> {
        self.world().find_by_parent(handle)
    }

    pub fn current_layer(&self) -> u8 {
        self.placer.as_ref().map_or(self.layer, |p| p.current_layer())
    }

    pub fn current_nets(&self) -> Vec<NetId> {
        self.placer.as_ref().map_or_else(Vec::new, |p| p.current_nets())
    }

    pub fn tuning_status(&self) -> Option<TuningStatus> {
        self.placer.as_ref().and_then(|p| p.tuning_status())
    }

    pub fn trial(&self) -> Option<&Node> {
        self.placer.as_ref().and_then(|p| p.trial())
    }

    /// Why the last operation failed, or an empty string.
    pub fn failure_reason(&self) -> String {
        self.failure.as_ref().map(|f| f.to_string()).unwrap_or_default()
    }

    pub fn failure(&self) -> Option<&Failure> {
        self.failure.as_ref()
    }
}
