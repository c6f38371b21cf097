//! Clustering of overlapping candidates into detections.
//!
//! Candidates are partitioned with a disjoint-set forest under a
//! size-relative similarity test, each class is averaged into one object and
//! weak clusters nested inside stronger ones are suppressed.

use crate::candidate::Object;
use crate::geom::Rect;
use crate::registry::Tag;
use crate::util::math::round_isize;
use std::collections::BTreeMap;

/// Returns true when all four edges of `a` and `b` differ by at most
/// `size_difference_max * (min width + min height) / 2`.
pub fn similar(a: &Rect, b: &Rect, size_difference_max: f64) -> bool {
    let delta = size_difference_max
        * (a.width().min(b.width()) + a.height().min(b.height())) as f64
        * 0.5;
    let close = |p: isize, q: isize| ((p - q).abs() as f64) <= delta;
    close(a.left, b.left)
        && close(a.top, b.top)
        && close(a.right, b.right)
        && close(a.bottom, b.bottom)
}

fn find_root(parent: &[usize], mut node: usize) -> usize {
    while parent[node] != node {
        node = parent[node];
    }
    node
}

fn compress(parent: &mut [usize], mut node: usize, root: usize) {
    while parent[node] != node {
        let next = parent[node];
        parent[node] = root;
        node = next;
    }
}

/// Assigns a class label to every object; returns the labels and the number
/// of classes.
///
/// Labels are numbered in order of the first object of each class.
pub fn partition(objects: &[Object], size_difference_max: f64) -> (Vec<usize>, usize) {
    let n = objects.len();
    let mut parent: Vec<usize> = (0..n).collect();
    let mut rank = vec![0usize; n];

    for i in 0..n {
        let mut root = find_root(&parent, i);
        for j in 0..n {
            if i == j || !similar(&objects[i].rect, &objects[j].rect, size_difference_max) {
                continue;
            }
            let root2 = find_root(&parent, j);
            if root2 == root {
                continue;
            }
            if rank[root] > rank[root2] {
                parent[root2] = root;
            } else {
                parent[root] = root2;
                if rank[root] == rank[root2] {
                    rank[root2] += 1;
                }
                root = root2;
            }
            compress(&mut parent, j, root);
            compress(&mut parent, i, root);
        }
    }

    let mut class_of_root: Vec<Option<usize>> = vec![None; n];
    let mut classes = 0;
    let labels = (0..n)
        .map(|i| {
            let root = find_root(&parent, i);
            *class_of_root[root].get_or_insert_with(|| {
                classes += 1;
                classes - 1
            })
        })
        .collect();
    (labels, classes)
}

/// Clusters candidates of one tag into detections.
///
/// Returns nothing when `group_size_min` is 0 or there are fewer candidates
/// than it. Only clusters with at least `group_size_min` members survive.
pub fn group_objects(
    candidates: &[Object],
    group_size_min: usize,
    size_difference_max: f64,
) -> Vec<Object> {
    if group_size_min == 0 || candidates.len() < group_size_min {
        return Vec::new();
    }

    let (labels, classes) = partition(candidates, size_difference_max);
    let mut sums = vec![[0isize; 4]; classes];
    let mut clusters = vec![Object::new(Rect::default(), 0, Tag::UNDEFINED); classes];
    for (candidate, &label) in candidates.iter().zip(&labels) {
        let r = candidate.rect;
        let sum = &mut sums[label];
        sum[0] += r.left;
        sum[1] += r.top;
        sum[2] += r.right;
        sum[3] += r.bottom;
        clusters[label].weight += 1;
        clusters[label].tag = candidate.tag;
    }
    for (cluster, sum) in clusters.iter_mut().zip(&sums) {
        let n = cluster.weight as f64;
        cluster.rect = Rect::new(
            round_isize(sum[0] as f64 / n),
            round_isize(sum[1] as f64 / n),
            round_isize(sum[2] as f64 / n),
            round_isize(sum[3] as f64 / n),
        );
    }

    clusters
        .iter()
        .enumerate()
        .filter(|(i, c)| {
            c.weight >= group_size_min
                && !is_suppressed(&clusters, *i, group_size_min, size_difference_max)
        })
        .map(|(_, c)| *c)
        .collect()
}

fn is_suppressed(
    clusters: &[Object],
    i: usize,
    group_size_min: usize,
    size_difference_max: f64,
) -> bool {
    let r1 = clusters[i].rect;
    let n1 = clusters[i].weight;
    clusters.iter().enumerate().any(|(j, other)| {
        let n2 = other.weight;
        if j == i || n2 < group_size_min {
            return false;
        }
        let r2 = other.rect;
        let dx = round_isize(r2.width() as f64 * size_difference_max);
        let dy = round_isize(r2.height() as f64 * size_difference_max);
        (n2 > n1.max(3) || n1 < 3)
            && r1.left >= r2.left - dx
            && r1.top >= r2.top - dy
            && r1.right <= r2.right + dx
            && r1.bottom <= r2.bottom + dy
    })
}

/// Clusters every tag independently and concatenates the results in
/// ascending tag order.
pub fn group_by_tag(
    candidates: BTreeMap<Tag, Vec<Object>>,
    group_size_min: usize,
    size_difference_max: f64,
) -> Vec<Object> {
    #[cfg(feature = "rayon")]
    {
        use rayon::prelude::*;
        let groups: Vec<Vec<Object>> = candidates
            .into_par_iter()
            .map(|(_, objects)| group_objects(&objects, group_size_min, size_difference_max))
            .collect();
        groups.into_iter().flatten().collect()
    }
    #[cfg(not(feature = "rayon"))]
    {
        candidates
            .values()
            .flat_map(|objects| group_objects(objects, group_size_min, size_difference_max))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{group_by_tag, group_objects, partition, similar};
    use crate::candidate::Object;
    use crate::geom::Rect;
    use crate::registry::Tag;
    use std::collections::BTreeMap;

    fn obj(l: isize, t: isize, r: isize, b: isize) -> Object {
        Object::new(Rect::new(l, t, r, b), 1, Tag(0))
    }

    #[test]
    fn similarity_uses_smaller_extents() {
        let a = Rect::new(0, 0, 100, 100);
        assert!(similar(&a, &Rect::new(10, 10, 110, 110), 0.2));
        assert!(!similar(&a, &Rect::new(25, 0, 125, 100), 0.2));
        assert!(!similar(&a, &Rect::new(0, 0, 50, 50), 0.2));
    }

    #[test]
    fn partition_labels_follow_first_appearance() {
        let objects = vec![
            obj(100, 100, 120, 120),
            obj(0, 0, 20, 20),
            obj(101, 100, 121, 120),
            obj(1, 1, 21, 21),
        ];
        let (labels, classes) = partition(&objects, 0.2);
        assert_eq!(classes, 2);
        assert_eq!(labels, vec![0, 1, 0, 1]);
    }

    #[test]
    fn nearby_candidates_merge_into_mean() {
        let objects = vec![
            obj(10, 10, 30, 30),
            obj(11, 10, 31, 30),
            obj(12, 11, 32, 31),
        ];
        let out = group_objects(&objects, 3, 0.2);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].rect, Rect::new(11, 10, 31, 30));
        assert_eq!(out[0].weight, 3);
    }

    #[test]
    fn small_groups_are_dropped() {
        let objects = vec![obj(0, 0, 10, 10), obj(0, 0, 10, 10), obj(50, 50, 60, 60)];
        assert!(group_objects(&objects, 3, 0.2).is_empty());
        assert!(group_objects(&objects, 0, 0.2).is_empty());
        assert_eq!(group_objects(&objects, 2, 0.2).len(), 1);
    }

    #[test]
    fn weak_nested_cluster_is_suppressed() {
        let mut objects = Vec::new();
        for _ in 0..10 {
            objects.push(obj(0, 0, 100, 100));
        }
        for _ in 0..3 {
            objects.push(obj(40, 40, 60, 60));
        }
        let out = group_objects(&objects, 3, 0.2);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].weight, 10);
        assert_eq!(out[0].rect, Rect::new(0, 0, 100, 100));
    }

    #[test]
    fn tags_are_grouped_in_ascending_order() {
        let mut candidates = BTreeMap::new();
        for tag in [Tag(5), Tag(1)] {
            let objects: Vec<Object> = (0..3)
                .map(|_| Object::new(Rect::new(0, 0, 10, 10), 1, tag))
                .collect();
            candidates.insert(tag, objects);
        }
        let out = group_by_tag(candidates, 3, 0.2);
        let tags: Vec<Tag> = out.iter().map(|o| o.tag).collect();
        assert_eq!(tags, vec![Tag(1), Tag(5)]);
    }
}
