// Binary `.nav` file persistence, one file per level.
//
// Layout (all fields little-endian, no compression):
//
//   header:  i32 magic ("NAV1"), i32 version, i32 node_count
//   node:    i32 id, f32 x, f32 y, f32 z, u32 flags, u32 team_access,
//            i32 num_neighbors, then exactly MAX_NODE_NEIGHBORS slots of
//            (i32 neighbor_id, f32 cost, i32 move_type)
//
// Unused neighbor slots are written as (-1, 0.0, 0). Only live nodes are
// written, in ascending id order; ids keep their value across a round trip,
// so a graph with holes reloads with the same holes.
//
// Decoding builds a fresh `NavGraph` and validates everything before the
// caller ever sees it. `load_level` swaps it in only on success, so a
// rejected file leaves the in-memory graph untouched.
//
// See also: `nav.rs` for the in-memory graph and its invariants,
// `navigator.rs` which drives load/save on level change.

use crate::error::{NavError, Result};
use crate::nav::{MAX_NODE_NEIGHBORS, NavEdge, NavGraph, NavNode};
use crate::types::{MoveType, NodeFlags, NodeId, TeamAccess, Vec3};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::{info, warn};
use smallvec::SmallVec;
use std::fs;
use std::io::{self, Cursor, Read, Write};
use std::path::{Path, PathBuf};

/// "NAV1" packed little-endian.
pub const NAV_FILE_MAGIC: u32 = 0x3156_414E;

pub const NAV_FILE_VERSION: i32 = 1;

/// Sentinel id written into unused neighbor slots.
pub const INVALID_NODE: i32 = -1;

pub const NAV_FILE_EXTENSION: &str = "nav";

/// Bytes per node record.
pub const NODE_RECORD_SIZE: usize = 4 + 12 + 4 + 4 + 4 + MAX_NODE_NEIGHBORS * 12;

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Write the live nodes of `graph` in `.nav` format.
pub fn encode_graph<W: Write>(writer: &mut W, graph: &NavGraph) -> io::Result<()> {
    let count = graph.live_count();
    writer.write_u32::<LittleEndian>(NAV_FILE_MAGIC)?;
    writer.write_i32::<LittleEndian>(NAV_FILE_VERSION)?;
    writer.write_i32::<LittleEndian>(count as i32)?;

    for node in graph.nodes() {
        writer.write_i32::<LittleEndian>(node.id.0 as i32)?;
        writer.write_f32::<LittleEndian>(node.position.x)?;
        writer.write_f32::<LittleEndian>(node.position.y)?;
        writer.write_f32::<LittleEndian>(node.position.z)?;
        writer.write_u32::<LittleEndian>(node.flags.bits())?;
        writer.write_u32::<LittleEndian>(node.team_access.bits())?;
        writer.write_i32::<LittleEndian>(node.edges.len() as i32)?;
        for slot in 0..MAX_NODE_NEIGHBORS {
            match node.edges.get(slot) {
                Some(edge) => {
                    writer.write_i32::<LittleEndian>(edge.to.0 as i32)?;
                    writer.write_f32::<LittleEndian>(edge.cost)?;
                    writer.write_i32::<LittleEndian>(edge.move_type.raw())?;
                }
                None => {
                    writer.write_i32::<LittleEndian>(INVALID_NODE)?;
                    writer.write_f32::<LittleEndian>(0.0)?;
                    writer.write_i32::<LittleEndian>(MoveType::Walk.raw())?;
                }
            }
        }
    }
    writer.flush()
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Read a `.nav` stream into a new graph of the given capacity.
///
/// Rejects (with `NavError::Validation`) a wrong magic or version, a node
/// count outside `[0, capacity]`, truncation at any field, and any record
/// that would break the graph invariants: ids out of range or repeated,
/// neighbor counts above `MAX_NODE_NEIGHBORS`, unknown movement types,
/// non-positive costs, self-loops, duplicate or dangling edges.
pub fn decode_graph<R: Read>(reader: &mut R, capacity: usize) -> Result<NavGraph> {
    let magic = field(reader.read_u32::<LittleEndian>(), "magic")?;
    if magic != NAV_FILE_MAGIC {
        return Err(invalid(format!("bad magic 0x{magic:08X}")));
    }
    let version = field(reader.read_i32::<LittleEndian>(), "version")?;
    if version != NAV_FILE_VERSION {
        return Err(invalid(format!("unsupported version {version}")));
    }
    let count = field(reader.read_i32::<LittleEndian>(), "node count")?;
    if count < 0 || count as usize > capacity {
        return Err(invalid(format!(
            "node count {count} outside [0, {capacity}]"
        )));
    }

    let mut graph = NavGraph::with_capacity(capacity);
    for _ in 0..count {
        let node = read_node(reader, capacity)?;
        if graph.is_live(node.id) {
            return Err(invalid(format!("duplicate node id {}", node.id)));
        }
        graph.insert_decoded(node);
    }

    for node in graph.nodes() {
        if let Some(edge) = node.edges.iter().find(|e| !graph.is_live(e.to)) {
            return Err(invalid(format!(
                "node {} links to missing node {}",
                node.id, edge.to
            )));
        }
    }
    Ok(graph)
}

fn read_node<R: Read>(reader: &mut R, capacity: usize) -> Result<NavNode> {
    let raw_id = field(reader.read_i32::<LittleEndian>(), "node id")?;
    let id = checked_id(raw_id, capacity)
        .ok_or_else(|| invalid(format!("node id {raw_id} outside [0, {capacity})")))?;

    let x = field(reader.read_f32::<LittleEndian>(), "origin")?;
    let y = field(reader.read_f32::<LittleEndian>(), "origin")?;
    let z = field(reader.read_f32::<LittleEndian>(), "origin")?;
    let flags = field(reader.read_u32::<LittleEndian>(), "flags")?;
    let team = field(reader.read_u32::<LittleEndian>(), "team access")?;
    let num_neighbors = field(reader.read_i32::<LittleEndian>(), "neighbor count")?;
    if !(0..=MAX_NODE_NEIGHBORS as i32).contains(&num_neighbors) {
        return Err(invalid(format!(
            "node {id} has {num_neighbors} neighbors (max {MAX_NODE_NEIGHBORS})"
        )));
    }

    let mut edges: SmallVec<[NavEdge; MAX_NODE_NEIGHBORS]> = SmallVec::new();
    for slot in 0..MAX_NODE_NEIGHBORS {
        let raw_to = field(reader.read_i32::<LittleEndian>(), "neighbor id")?;
        let cost = field(reader.read_f32::<LittleEndian>(), "edge cost")?;
        let raw_move = field(reader.read_i32::<LittleEndian>(), "move type")?;
        if slot >= num_neighbors as usize {
            continue;
        }

        let to = checked_id(raw_to, capacity)
            .ok_or_else(|| invalid(format!("node {id} links to id {raw_to}")))?;
        let move_type = MoveType::from_raw(raw_move)
            .ok_or_else(|| invalid(format!("node {id} edge has move type {raw_move}")))?;
        if !cost.is_finite() || cost <= 0.0 {
            return Err(invalid(format!("node {id} edge to {to} has cost {cost}")));
        }
        if to == id {
            return Err(invalid(format!("node {id} links to itself")));
        }
        if edges.iter().any(|e| e.to == to) {
            return Err(invalid(format!("node {id} lists {to} twice")));
        }
        edges.push(NavEdge {
            to,
            cost,
            move_type,
        });
    }

    Ok(NavNode {
        id,
        position: Vec3::new(x, y, z),
        flags: NodeFlags::from_bits_retain(flags),
        team_access: TeamAccess::from_bits_retain(team),
        edges,
    })
}

fn checked_id(raw: i32, capacity: usize) -> Option<NodeId> {
    (raw >= 0 && (raw as usize) < capacity).then_some(NodeId(raw as u32))
}

fn invalid(msg: String) -> NavError {
    NavError::Validation(format!("nav file: {msg}"))
}

/// Map a read failure: running out of bytes is a malformed file, anything
/// else is a real I/O error.
fn field<T>(res: io::Result<T>, what: &str) -> Result<T> {
    res.map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => invalid(format!("truncated at {what}")),
        _ => NavError::Io(e),
    })
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

/// `<maps_dir>/<level>.nav`. The level name must be non-empty and a plain
/// file stem.
pub fn nav_file_path(maps_dir: &Path, level: &str) -> Result<PathBuf> {
    if level.is_empty() {
        return Err(NavError::Validation("empty level name".into()));
    }
    if level.contains(['/', '\\']) || level == "." || level == ".." {
        return Err(NavError::Validation(format!(
            "level name {level:?} is not a plain name"
        )));
    }
    Ok(maps_dir.join(format!("{level}.{NAV_FILE_EXTENSION}")))
}

/// Read and decode a `.nav` file.
pub fn read_graph_file(path: &Path, capacity: usize) -> Result<NavGraph> {
    let bytes = fs::read(path)?;
    decode_graph(&mut Cursor::new(bytes), capacity)
}

/// Encode and write a `.nav` file, creating parent directories. The bytes
/// go to `<path>.tmp` first and are renamed over `path`, so an existing file
/// is either fully replaced or left as it was.
pub fn write_graph_file(path: &Path, graph: &NavGraph) -> Result<()> {
    let mut buf = Vec::with_capacity(12 + graph.live_count() * NODE_RECORD_SIZE);
    encode_graph(&mut buf, graph)?;
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    if let Err(e) = fs::write(&tmp, buf).and_then(|()| fs::rename(&tmp, path)) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

/// Load the graph for `level` into `graph`, replacing its contents. On any
/// failure `graph` is left exactly as it was. Returns the node count.
pub fn load_level(maps_dir: &Path, level: &str, graph: &mut NavGraph) -> Result<usize> {
    let path = nav_file_path(maps_dir, level)?;
    match read_graph_file(&path, graph.capacity()) {
        Ok(loaded) => {
            let count = loaded.live_count();
            graph.replace_with(loaded);
            info!("loaded {count} nav nodes from {}", path.display());
            Ok(count)
        }
        Err(e) => {
            warn!("could not load {}: {e}", path.display());
            Err(e)
        }
    }
}

/// Save `graph` as the graph for `level`. Returns the path written.
pub fn save_level(maps_dir: &Path, level: &str, graph: &NavGraph) -> Result<PathBuf> {
    let path = nav_file_path(maps_dir, level)?;
    if let Err(e) = write_graph_file(&path, graph) {
        warn!("could not save {}: {e}", path.display());
        return Err(e);
    }
    info!("saved {} nav nodes to {}", graph.live_count(), path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::nav::MAX_NAV_NODES;
    use tempfile::TempDir;

    fn sample_graph() -> NavGraph {
        let mut graph = NavGraph::new();
        let a = graph.add(Vec3::new(0.0, 0.0, 24.0), NodeFlags::GROUND).unwrap();
        let b = graph
            .add(Vec3::new(128.0, 0.0, 24.0), NodeFlags::GROUND | NodeFlags::CAMP)
            .unwrap();
        let c = graph
            .add(Vec3::new(128.0, 64.0, 96.0), NodeFlags::WALLCLIMB)
            .unwrap();
        graph.connect(a, b, 128.0, MoveType::Walk).unwrap();
        graph.connect(b, c, 90.5, MoveType::Climb).unwrap();
        graph.set_team_access(c, TeamAccess::ALIEN).unwrap();
        graph
    }

    fn encode(graph: &NavGraph) -> Vec<u8> {
        let mut buf = Vec::new();
        encode_graph(&mut buf, graph).unwrap();
        buf
    }

    fn assert_same_nodes(a: &NavGraph, b: &NavGraph) {
        let left: Vec<_> = a.nodes().collect();
        let right: Vec<_> = b.nodes().collect();
        assert_eq!(left, right);
    }

    #[test]
    fn roundtrip_preserves_graph() {
        let graph = sample_graph();
        let restored = decode_graph(&mut Cursor::new(encode(&graph)), MAX_NAV_NODES).unwrap();
        assert_same_nodes(&graph, &restored);
    }

    #[test]
    fn roundtrip_keeps_holes() {
        let mut graph = sample_graph();
        graph.remove(NodeId(1));
        let restored = decode_graph(&mut Cursor::new(encode(&graph)), MAX_NAV_NODES).unwrap();
        assert!(!restored.is_live(NodeId(1)));
        assert!(restored.is_live(NodeId(2)));
        assert_same_nodes(&graph, &restored);
    }

    #[test]
    fn header_and_record_layout() {
        let mut graph = NavGraph::new();
        graph.add(Vec3::new(1.0, 2.0, 3.0), NodeFlags::GROUND).unwrap();
        let buf = encode(&graph);
        assert_eq!(buf.len(), 12 + NODE_RECORD_SIZE);
        assert_eq!(&buf[0..4], b"NAV1");
        assert_eq!(&buf[4..8], &1i32.to_le_bytes());
        assert_eq!(&buf[8..12], &1i32.to_le_bytes());

        // First unused neighbor slot: (-1, 0.0, 0).
        let slot = 12 + 4 + 12 + 4 + 4 + 4;
        assert_eq!(&buf[slot..slot + 4], &(-1i32).to_le_bytes());
        assert_eq!(&buf[slot + 4..slot + 8], &0.0f32.to_le_bytes());
        assert_eq!(&buf[slot + 8..slot + 12], &0i32.to_le_bytes());
    }

    #[test]
    fn empty_graph_roundtrip() {
        let buf = encode(&NavGraph::new());
        assert_eq!(buf.len(), 12);
        let restored = decode_graph(&mut Cursor::new(buf), MAX_NAV_NODES).unwrap();
        assert_eq!(restored.live_count(), 0);
    }

    #[test]
    fn rejects_bad_header() {
        let good = encode(&sample_graph());

        let mut bad_magic = good.clone();
        bad_magic[0] = b'X';
        let mut bad_version = good.clone();
        bad_version[4..8].copy_from_slice(&2i32.to_le_bytes());
        let mut negative_count = good.clone();
        negative_count[8..12].copy_from_slice(&(-1i32).to_le_bytes());

        for buf in [bad_magic, bad_version, negative_count] {
            let err = decode_graph(&mut Cursor::new(buf), MAX_NAV_NODES).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        }
    }

    #[test]
    fn rejects_count_above_capacity() {
        let buf = encode(&sample_graph());
        let err = decode_graph(&mut Cursor::new(buf), 2).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn rejects_truncation_anywhere() {
        let buf = encode(&sample_graph());
        for len in 0..buf.len() {
            let err = decode_graph(&mut Cursor::new(&buf[..len]), MAX_NAV_NODES).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation, "prefix of {len} bytes");
        }
    }

    #[test]
    fn rejects_bad_edge_records() {
        let good = encode(&sample_graph());
        // Node 0's first neighbor slot.
        let slot = 12 + 4 + 12 + 4 + 4 + 4;

        let mut unknown_move = good.clone();
        unknown_move[slot + 8..slot + 12].copy_from_slice(&9i32.to_le_bytes());
        let mut zero_cost = good.clone();
        zero_cost[slot + 4..slot + 8].copy_from_slice(&0.0f32.to_le_bytes());
        let mut dangling = good.clone();
        dangling[slot..slot + 4].copy_from_slice(&40i32.to_le_bytes());
        let mut self_loop = good.clone();
        self_loop[slot..slot + 4].copy_from_slice(&0i32.to_le_bytes());
        let mut too_many = good.clone();
        too_many[slot - 4..slot].copy_from_slice(&9i32.to_le_bytes());

        for buf in [unknown_move, zero_cost, dangling, self_loop, too_many] {
            let err = decode_graph(&mut Cursor::new(buf), MAX_NAV_NODES).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        }
    }

    #[test]
    fn rejects_duplicate_node_ids() {
        let mut buf = encode(&sample_graph());
        // Rewrite node 1's id as 0.
        let second = 12 + NODE_RECORD_SIZE;
        buf[second..second + 4].copy_from_slice(&0i32.to_le_bytes());
        let err = decode_graph(&mut Cursor::new(buf), MAX_NAV_NODES).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn level_path_rules() {
        let dir = Path::new("maps");
        assert_eq!(
            nav_file_path(dir, "outpost").unwrap(),
            PathBuf::from("maps/outpost.nav")
        );
        for bad in ["", "..", "a/b", "a\\b"] {
            assert_eq!(
                nav_file_path(dir, bad).unwrap_err().kind(),
                ErrorKind::Validation
            );
        }
    }

    #[test]
    fn save_then_load_level() {
        let tmp = TempDir::new().unwrap();
        let graph = sample_graph();
        let path = save_level(tmp.path(), "outpost", &graph).unwrap();
        assert!(path.ends_with("outpost.nav"));

        let mut loaded = NavGraph::new();
        let before = loaded.generation();
        assert_eq!(load_level(tmp.path(), "outpost", &mut loaded).unwrap(), 3);
        assert!(loaded.generation() > before);
        assert_same_nodes(&graph, &loaded);
    }

    #[test]
    fn failed_save_keeps_previous_file() {
        let tmp = TempDir::new().unwrap();
        let graph = sample_graph();
        let path = save_level(tmp.path(), "outpost", &graph).unwrap();
        let saved = fs::read(&path).unwrap();

        // A directory squatting on the staging name makes the write fail.
        fs::create_dir(tmp.path().join("outpost.nav.tmp")).unwrap();
        let err = save_level(tmp.path(), "outpost", &NavGraph::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(fs::read(&path).unwrap(), saved);

        fs::remove_dir(tmp.path().join("outpost.nav.tmp")).unwrap();
        save_level(tmp.path(), "outpost", &NavGraph::new()).unwrap();
        assert!(!tmp.path().join("outpost.nav.tmp").exists());
        let mut loaded = sample_graph();
        assert_eq!(load_level(tmp.path(), "outpost", &mut loaded).unwrap(), 0);
    }

    #[test]
    fn failed_load_leaves_graph_untouched() {
        let tmp = TempDir::new().unwrap();
        let mut graph = sample_graph();
        let generation = graph.generation();

        let missing = load_level(tmp.path(), "nowhere", &mut graph).unwrap_err();
        assert_eq!(missing.kind(), ErrorKind::Io);

        let mut buf = encode(&NavGraph::new());
        buf.truncate(7);
        fs::write(tmp.path().join("broken.nav"), buf).unwrap();
        let broken = load_level(tmp.path(), "broken", &mut graph).unwrap_err();
        assert_eq!(broken.kind(), ErrorKind::Validation);

        assert_eq!(graph.generation(), generation);
        assert_same_nodes(&graph, &sample_graph());
    }
}
