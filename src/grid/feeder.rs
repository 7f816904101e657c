use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use super::{LineId, LineLoading, LineTable, PowerFlow, PowerFlowFailure};

/// One feeder line between two buses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeederLine {
    /// Line identifier, unique within the feeder.
    pub id: LineId,
    /// Sending-end bus.
    pub from_bus: usize,
    /// Receiving-end bus.
    pub to_bus: usize,
    /// Thermal current limit (kA).
    pub max_i_ka: f64,
}

impl FeederLine {
    /// Descriptive label used in tables and exports.
    pub fn label(&self) -> String {
        format!(
            "Line {} (Bus {} -> Bus {})",
            self.id, self.from_bus, self.to_bus
        )
    }
}

/// A radial feeder that turns a uniform community net demand into line loadings.
///
/// Net demand convention:
/// - Positive values are consumption at every community bus
/// - Negative values are injection at every community bus
///
/// Each line carries the net demand of everything downstream of it. Losses
/// and reactive power are ignored, so current is `|P| / (√3 · Vn)` and
/// loading is that current as a percentage of the line's thermal limit.
///
/// The topology is walked afresh on every evaluation, so a malformed feeder
/// (a loop, or a community bus with no path to a source) fails each call
/// with a [`PowerFlowFailure`] instead of producing loadings.
#[derive(Debug, Clone)]
pub struct FeederModel {
    name: String,
    vn_kv: f64,
    lines: Vec<FeederLine>,
    source_buses: Vec<usize>,
    community_buses: Vec<usize>,
}

/// Parent links produced by walking the feeder outward from its sources.
struct Tree {
    /// Buses in breadth-first order from the sources.
    order: Vec<usize>,
    /// For each non-source bus reached: `(index of feeding line, upstream bus)`.
    parent: HashMap<usize, (usize, usize)>,
}

impl FeederModel {
    /// Creates a feeder model.
    ///
    /// # Arguments
    ///
    /// * `name` - Feeder name used in logs and reports
    /// * `vn_kv` - Nominal line-to-line voltage (kV)
    /// * `lines` - Feeder lines; results are reported in ascending id order
    /// * `source_buses` - Buses fed from upstream (substation secondaries)
    /// * `community_buses` - Buses where the community net demand is applied
    pub fn new(
        name: impl Into<String>,
        vn_kv: f64,
        mut lines: Vec<FeederLine>,
        source_buses: Vec<usize>,
        community_buses: Vec<usize>,
    ) -> Self {
        lines.sort_by_key(|line| line.id);
        Self {
            name: name.into(),
            vn_kv,
            lines,
            source_buses,
            community_buses,
        }
    }

    /// Returns the feeder name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the feeder lines in ascending id order.
    pub fn lines(&self) -> &[FeederLine] {
        &self.lines
    }

    /// Returns the buses where net demand is applied.
    pub fn community_buses(&self) -> &[usize] {
        &self.community_buses
    }

    /// Checks that the feeder is radial and every community bus is supplied.
    ///
    /// # Errors
    ///
    /// Returns the same failure an evaluation would report.
    pub fn check(&self) -> Result<(), PowerFlowFailure> {
        self.walk().map(|_| ())
    }

    fn adjacency(&self) -> HashMap<usize, Vec<usize>> {
        let mut adjacency: HashMap<usize, Vec<usize>> = HashMap::new();
        for (idx, line) in self.lines.iter().enumerate() {
            adjacency.entry(line.from_bus).or_default().push(idx);
            adjacency.entry(line.to_bus).or_default().push(idx);
        }
        for &bus in &self.source_buses {
            adjacency.entry(bus).or_default();
        }
        adjacency
    }

    fn walk(&self) -> Result<Tree, PowerFlowFailure> {
        let adjacency = self.adjacency();
        for &bus in &self.community_buses {
            if !adjacency.contains_key(&bus) {
                return Err(PowerFlowFailure::UnknownBus { bus });
            }
        }

        let mut order = Vec::with_capacity(adjacency.len());
        let mut parent: HashMap<usize, (usize, usize)> = HashMap::new();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        for &source in &self.source_buses {
            if visited.insert(source) {
                queue.push_back(source);
            }
        }

        let mut used_line = vec![false; self.lines.len()];
        while let Some(bus) = queue.pop_front() {
            order.push(bus);
            for &idx in adjacency.get(&bus).map(Vec::as_slice).unwrap_or_default() {
                if used_line[idx] {
                    continue;
                }
                used_line[idx] = true;
                let line = &self.lines[idx];
                let next = if line.from_bus == bus {
                    line.to_bus
                } else {
                    line.from_bus
                };
                if !visited.insert(next) {
                    return Err(PowerFlowFailure::NotRadial { line: line.id });
                }
                parent.insert(next, (idx, bus));
                queue.push_back(next);
            }
        }

        if let Some(&bus) = self
            .community_buses
            .iter()
            .find(|bus| !visited.contains(*bus))
        {
            return Err(PowerFlowFailure::Island { bus });
        }

        Ok(Tree { order, parent })
    }
}

impl PowerFlow for FeederModel {
    fn evaluate(&self, net_demand_kw: f64) -> Result<LineTable, PowerFlowFailure> {
        let tree = self.walk()?;

        let mut downstream_kw: BTreeMap<usize, f64> = BTreeMap::new();
        for &bus in &self.community_buses {
            *downstream_kw.entry(bus).or_insert(0.0) += net_demand_kw;
        }

        let mut line_kw = vec![0.0_f64; self.lines.len()];
        for bus in tree.order.iter().rev() {
            if let Some(&(idx, upstream)) = tree.parent.get(bus) {
                let carried = downstream_kw.get(bus).copied().unwrap_or(0.0);
                line_kw[idx] += carried;
                *downstream_kw.entry(upstream).or_insert(0.0) += carried;
            }
        }

        let base_current_a = (3.0_f64).sqrt() * self.vn_kv;
        let mut table = Vec::with_capacity(self.lines.len());
        for (line, p_kw) in self.lines.iter().zip(line_kw) {
            // kW / kV gives amperes
            let current_a = p_kw.abs() / base_current_a;
            let loading_percent = 100.0 * current_a / (line.max_i_ka * 1000.0);
            if !loading_percent.is_finite() {
                return Err(PowerFlowFailure::NonFinite { line: line.id });
            }
            table.push(LineLoading {
                line_id: line.id,
                label: line.label(),
                loading_percent,
            });
        }
        Ok(table)
    }
}
