use super::types::{Dimensions, Point, TreeNode, ViewTransform, Viewport};

/// Bounding box of every card centre, padded by one card slot, plus the offset that moves
/// the top-left card into view.
pub(super) fn measure(
    nodes: &[TreeNode],
    node_separation: f64,
    level_separation: f64,
) -> Dimensions {
    let extent = |axis: fn(&TreeNode) -> f64| {
        nodes
            .iter()
            .map(axis)
            .fold(None, |acc: Option<(f64, f64)>, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
            .unwrap_or((0.0, 0.0))
    };
    let (min_x, max_x) = extent(|n| n.x);
    let (min_y, max_y) = extent(|n| n.y);
    Dimensions {
        width: max_x - min_x + node_separation,
        height: max_y - min_y + level_separation,
        x_offset: -min_x + node_separation / 2.0,
        y_offset: -min_y + level_separation / 2.0,
    }
}

impl Dimensions {
    /// Scale (never above 1) and translation that fit the whole tree into `viewport`.
    pub fn fit_to_viewport(&self, viewport: Viewport) -> ViewTransform {
        let k = (viewport.width / self.width)
            .min(viewport.height / self.height)
            .min(1.0);
        ViewTransform {
            k,
            x: self.x_offset + (viewport.width - self.width * k) / k / 2.0,
            y: self.y_offset + (viewport.height - self.height * k) / k / 2.0,
        }
    }
}

/// Translation that puts `point` in the middle of `viewport` at scale `scale` (1 when unset).
pub fn center_on(point: Point, viewport: Viewport, scale: Option<f64>) -> ViewTransform {
    let k = scale.unwrap_or(1.0);
    let (px, py) = point;
    ViewTransform {
        k,
        x: (viewport.width / 2.0 - px * k) / k,
        y: (viewport.height / 2.0 - py * k) / k,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::types::NodeKind;

    fn at(x: f64, y: f64) -> TreeNode {
        let mut node = TreeNode::new("n".into(), NodeKind::Blood);
        node.x = x;
        node.y = y;
        node
    }

    #[test]
    fn pads_extent_by_one_slot() {
        let dim = measure(&[at(-125.0, 0.0), at(125.0, 150.0)], 250.0, 150.0);
        assert_eq!(dim.width, 500.0);
        assert_eq!(dim.height, 300.0);
        assert_eq!(dim.x_offset, 250.0);
        assert_eq!(dim.y_offset, 75.0);
    }

    #[test]
    fn lone_card_fills_one_slot() {
        let dim = measure(&[at(0.0, 0.0)], 250.0, 150.0);
        assert_eq!((dim.width, dim.height), (250.0, 150.0));
    }

    #[test]
    fn fit_never_scales_up() {
        let dim = measure(&[at(0.0, 0.0)], 250.0, 150.0);
        let view = dim.fit_to_viewport(Viewport {
            width: 1000.0,
            height: 600.0,
        });
        assert_eq!(view.k, 1.0);
        assert_eq!(view.x, 125.0 + 375.0);
        assert_eq!(view.y, 75.0 + 225.0);
    }

    #[test]
    fn fit_scales_down_large_trees() {
        let dim = measure(&[at(0.0, 0.0), at(1750.0, 0.0)], 250.0, 150.0);
        let view = dim.fit_to_viewport(Viewport {
            width: 1000.0,
            height: 600.0,
        });
        assert_eq!(view.k, 0.5);
    }

    #[test]
    fn center_on_point() {
        let view = center_on(
            (100.0, -50.0),
            Viewport {
                width: 800.0,
                height: 600.0,
            },
            Some(2.0),
        );
        assert_eq!((view.k, view.x, view.y), (2.0, 100.0, 200.0));
    }
}
