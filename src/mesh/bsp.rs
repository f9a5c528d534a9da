//! [BSP](https://en.wikipedia.org/wiki/Binary_space_partitioning) tree used for
//! clipping relief sheets against the card footprint and the bottom cutter.

use crate::float_types::Real;
use crate::mesh::plane::{BACK, COPLANAR, FRONT, Plane};
use crate::mesh::polygon::Polygon;

/// A BSP tree node, containing polygons plus optional front/back subtrees.
#[derive(Debug, Clone)]
pub struct Node {
    /// Splitting plane for this node, `None` for an unbuilt leaf.
    pub plane: Option<Plane>,
    pub front: Option<Box<Node>>,
    pub back: Option<Box<Node>>,
    /// Polygons lying exactly on `plane` after the node has been built.
    pub polygons: Vec<Polygon>,
}

impl Node {
    pub const fn new() -> Self {
        Self {
            plane: None,
            front: None,
            back: None,
            polygons: Vec::new(),
        }
    }

    pub fn from_polygons(polygons: &[Polygon]) -> Self {
        let mut node = Self::new();
        if !polygons.is_empty() {
            node.build(polygons);
        }
        node
    }

    /// Flip the solid this tree encloses (inside becomes outside).
    pub fn invert(&mut self) {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            node.polygons.iter_mut().for_each(|p| p.flip());
            if let Some(ref mut plane) = node.plane {
                plane.flip();
            }
            std::mem::swap(&mut node.front, &mut node.back);
            if let Some(ref mut front) = node.front {
                stack.push(front);
            }
            if let Some(ref mut back) = node.back {
                stack.push(back);
            }
        }
    }

    /// Candidate-plane heuristic weighing splits against front/back balance.
    fn pick_splitting_plane(&self, polygons: &[Polygon]) -> Plane {
        const K_SPANS: Real = 8.0;
        const K_BALANCE: Real = 1.0;

        let mut best_plane = polygons[0].plane.clone();
        let mut best_score = Real::MAX;

        let sample_size = polygons.len().min(20);
        for candidate in polygons.iter().take(sample_size) {
            let plane = &candidate.plane;
            let mut num_front = 0i64;
            let mut num_back = 0i64;
            let mut num_spanning = 0i64;

            for poly in polygons {
                let classification = poly
                    .vertices
                    .iter()
                    .fold(0, |acc, v| acc | plane.orient_point(&v.pos));
                match classification {
                    COPLANAR => {},
                    FRONT => num_front += 1,
                    BACK => num_back += 1,
                    _ => num_spanning += 1,
                }
            }

            let score = K_SPANS * num_spanning as Real
                + K_BALANCE * ((num_front - num_back) as Real).abs();
            if score < best_score {
                best_score = score;
                best_plane = plane.clone();
            }
        }
        best_plane
    }

    /// Remove (return the survivors of) all polygon parts that land inside
    /// this tree's solid. Iterative to stay safe on fine displacement grids.
    pub fn clip_polygons(&self, polygons: &[Polygon]) -> Vec<Polygon> {
        let mut result = Vec::new();
        let mut stack = vec![(self, polygons.to_vec())];

        while let Some((node, polys)) = stack.pop() {
            let Some(plane) = node.plane.as_ref() else {
                result.extend(polys);
                continue;
            };

            let mut front_polys = Vec::with_capacity(polys.len());
            let mut back_polys = Vec::with_capacity(polys.len());

            for polygon in &polys {
                let (coplanar_front, coplanar_back, mut front_parts, mut back_parts) =
                    plane.split_polygon(polygon);

                for coplanar_poly in coplanar_front.into_iter().chain(coplanar_back) {
                    if plane.orient_plane(&coplanar_poly.plane) == FRONT {
                        front_parts.push(coplanar_poly);
                    } else {
                        back_parts.push(coplanar_poly);
                    }
                }

                front_polys.append(&mut front_parts);
                back_polys.append(&mut back_parts);
            }

            if let Some(front_node) = &node.front {
                if !front_polys.is_empty() {
                    stack.push((front_node, front_polys));
                }
            } else {
                result.extend(front_polys);
            }

            if let Some(back_node) = &node.back {
                if !back_polys.is_empty() {
                    stack.push((back_node, back_polys));
                }
            }
            // back leaf without a child: those parts are inside => dropped
        }
        result
    }

    /// Remove all polygons in this tree that are inside `bsp`'s solid.
    pub fn clip_to(&mut self, bsp: &Node) {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            node.polygons = bsp.clip_polygons(&node.polygons);
            if let Some(front) = node.front.as_mut() {
                stack.push(front);
            }
            if let Some(back) = node.back.as_mut() {
                stack.push(back);
            }
        }
    }

    /// All polygons stored in this tree.
    pub fn all_polygons(&self) -> Vec<Polygon> {
        let mut result = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            result.extend_from_slice(&node.polygons);
            stack.extend(
                [&node.front, &node.back]
                    .iter()
                    .filter_map(|child| child.as_ref().map(|boxed| boxed.as_ref())),
            );
        }
        result
    }

    /// Build (or extend) the tree from `polygons`.
    pub fn build(&mut self, polygons: &[Polygon]) {
        if polygons.is_empty() {
            return;
        }

        let mut stack = vec![(self, polygons.to_vec())];
        while let Some((node, polys)) = stack.pop() {
            if polys.is_empty() {
                continue;
            }
            if node.plane.is_none() {
                node.plane = Some(node.pick_splitting_plane(&polys));
            }
            let plane = node.plane.as_ref().expect("plane chosen above").clone();

            let mut front = Vec::with_capacity(polys.len() / 2);
            let mut back = Vec::with_capacity(polys.len() / 2);

            for polygon in &polys {
                let (coplanar_front, coplanar_back, mut front_parts, mut back_parts) =
                    plane.split_polygon(polygon);
                node.polygons.extend(coplanar_front);
                node.polygons.extend(coplanar_back);
                front.append(&mut front_parts);
                back.append(&mut back_parts);
            }

            if !front.is_empty() {
                let front_node = node.front.get_or_insert_with(|| Box::new(Node::new()));
                stack.push((front_node, front));
            }
            if !back.is_empty() {
                let back_node = node.back.get_or_insert_with(|| Box::new(Node::new()));
                stack.push((back_node, back));
            }
        }
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::vertex::Vertex;
    use crate::shapes::cuboid;
    use nalgebra::{Point3, Vector3};

    fn tri_at(z: f64) -> Polygon {
        Polygon::new(vec![
            Vertex::new(Point3::new(-0.1, -0.1, z), Vector3::z()),
            Vertex::new(Point3::new(0.1, -0.1, z), Vector3::z()),
            Vertex::new(Point3::new(0.0, 0.1, z), Vector3::z()),
        ])
    }

    #[test]
    fn clip_drops_polygons_inside_solid() {
        let cube = cuboid(1.0, 1.0, 1.0, &Point3::origin());
        let tree = Node::from_polygons(&cube.polygons);
        // Triangle at the cube center is inside => clipped away.
        assert!(tree.clip_polygons(&[tri_at(0.0)]).is_empty());
        // Triangle above the cube survives untouched.
        assert_eq!(tree.clip_polygons(&[tri_at(2.0)]).len(), 1);
    }

    #[test]
    fn inverted_tree_keeps_the_inside() {
        let cube = cuboid(1.0, 1.0, 1.0, &Point3::origin());
        let mut tree = Node::from_polygons(&cube.polygons);
        tree.invert();
        assert_eq!(tree.clip_polygons(&[tri_at(0.0)]).len(), 1);
        assert!(tree.clip_polygons(&[tri_at(2.0)]).is_empty());
    }
}
