//! Merging of linestrings that meet at their endpoints.

use crate::geometry::{Coord, Geometry, LineString};
use std::collections::HashMap;

type NodeKey = (u64, u64);

fn node_key(c: &Coord) -> NodeKey {
    // + 0.0 folds -0.0 onto 0.0
    ((c.x + 0.0).to_bits(), (c.y + 0.0).to_bits())
}

fn collect_lines<'a>(geometry: &'a Geometry, lines: &mut Vec<&'a [Coord]>) {
    match geometry {
        Geometry::LineString(LineString(coords)) => lines.push(coords),
        Geometry::MultiLineString(parts) => lines.extend(parts.iter().map(|l| l.coords())),
        Geometry::GeometryCollection(members) => {
            for member in members {
                collect_lines(member, lines);
            }
        }
        _ => {}
    }
}

struct Edge<'a> {
    coords: &'a [Coord],
    start: NodeKey,
    end: NodeKey,
}

/// Merge linestrings sharing endpoints into maximal linestrings.
///
/// Lines are joined only through nodes touched by exactly two line ends.
/// Anything but linear input yields an empty `MultiLineString`.
pub fn line_merge(geometry: &Geometry) -> Geometry {
    if geometry.dimension() != 1 {
        return Geometry::MultiLineString(vec![]);
    }
    let mut lines = Vec::new();
    collect_lines(geometry, &mut lines);
    let edges: Vec<Edge> = lines
        .into_iter()
        .filter(|coords| coords.windows(2).any(|w| !w[0].equals_2d(&w[1])))
        .map(|coords| Edge {
            coords,
            start: node_key(&coords[0]),
            end: node_key(&coords[coords.len() - 1]),
        })
        .collect();

    let mut incident: HashMap<NodeKey, Vec<usize>> = HashMap::new();
    for (i, edge) in edges.iter().enumerate() {
        incident.entry(edge.start).or_default().push(i);
        incident.entry(edge.end).or_default().push(i);
    }
    let degree = |node: &NodeKey| incident.get(node).map_or(0, Vec::len);

    let mut visited = vec![false; edges.len()];
    let mut merged = Vec::new();
    // chains with an end node, then closed loops
    for pass in 0..2 {
        for first in 0..edges.len() {
            if visited[first] {
                continue;
            }
            let edge = &edges[first];
            let from = if degree(&edge.start) != 2 {
                edge.start
            } else if degree(&edge.end) != 2 {
                edge.end
            } else if pass == 1 {
                edge.start
            } else {
                continue;
            };
            merged.push(LineString(walk(&edges, &incident, &mut visited, first, from)));
        }
    }
    Geometry::MultiLineString(merged)
}

fn walk(
    edges: &[Edge],
    incident: &HashMap<NodeKey, Vec<usize>>,
    visited: &mut [bool],
    mut current: usize,
    mut from: NodeKey,
) -> Vec<Coord> {
    let mut coords: Vec<Coord> = Vec::new();
    loop {
        visited[current] = true;
        let edge = &edges[current];
        let forward = edge.start == from;
        let skip = usize::from(!coords.is_empty());
        if forward {
            coords.extend(edge.coords.iter().skip(skip));
        } else {
            coords.extend(edge.coords.iter().rev().skip(skip));
        }
        let to = if forward { edge.end } else { edge.start };
        let Some(next) = incident.get(&to).filter(|ends| ends.len() == 2).and_then(|ends| {
            ends.iter().copied().find(|&e| !visited[e])
        }) else {
            return coords;
        };
        current = next;
        from = to;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{LinearRing, Polygon};

    fn line(coords: &[(f64, f64)]) -> LineString {
        LineString(coords.iter().map(|&(x, y)| Coord::xy(x, y)).collect())
    }

    fn merged_lines(geometry: Geometry) -> Vec<LineString> {
        match line_merge(&geometry) {
            Geometry::MultiLineString(lines) => lines,
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn touching_segments() {
        let input = Geometry::MultiLineString(vec![
            line(&[(0.0, 0.0), (1.0, 1.0)]),
            line(&[(1.0, 1.0), (2.0, 2.0)]),
        ]);
        assert_eq!(
            merged_lines(input),
            vec![line(&[(0.0, 0.0), (1.0, 1.0), (2.0, 2.0)])]
        );
    }

    #[test]
    fn reversed_parts_are_flipped() {
        let input = Geometry::MultiLineString(vec![
            line(&[(1.0, 1.0), (2.0, 2.0)]),
            line(&[(3.0, 3.0), (2.0, 2.0)]),
        ]);
        assert_eq!(
            merged_lines(input),
            vec![line(&[(1.0, 1.0), (2.0, 2.0), (3.0, 3.0)])]
        );
    }

    #[test]
    fn junctions_stop_merging() {
        let input = Geometry::MultiLineString(vec![
            line(&[(0.0, 0.0), (1.0, 0.0)]),
            line(&[(1.0, 0.0), (2.0, 0.0)]),
            line(&[(1.0, 0.0), (1.0, 1.0)]),
        ]);
        assert_eq!(merged_lines(input).len(), 3);
    }

    #[test]
    fn closed_loop() {
        let input = Geometry::MultiLineString(vec![
            line(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)]),
            line(&[(1.0, 1.0), (0.0, 0.0)]),
        ]);
        let lines = merged_lines(input);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].is_closed());
        assert_eq!(lines[0].coords().len(), 4);
    }

    #[test]
    fn non_linear_input_is_empty() {
        let ring = LinearRing::new(vec![
            Coord::xy(0.0, 0.0),
            Coord::xy(1.0, 0.0),
            Coord::xy(1.0, 1.0),
            Coord::xy(0.0, 0.0),
        ])
        .unwrap();
        let polygon = Geometry::Polygon(Polygon::new(ring, vec![]));
        assert!(merged_lines(polygon).is_empty());
        assert!(merged_lines(Geometry::Point(Coord::xy(0.0, 0.0))).is_empty());
    }
}
