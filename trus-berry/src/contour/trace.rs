//! 8-邻域 Moore 边界追踪.

use crate::data::MaskSlice;
use crate::Idx2d;

/// Freeman 方向码对应的 `(dh, dw)` 偏移, 从 "右" 开始逆时针排列.
const DIRS: [(i64, i64); 8] = [
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// 追踪 `mask` 中包含 `start` 的前景区域的外边界, 返回首尾相接的 8-连通闭合曲线
/// (终点不重复起点).
///
/// # 注意
///
/// 1. `start` 必须是该区域行优先顺序中的第一个像素 (最上, 然后最左),
///   否则结果可能不是外边界.
/// 2. 图像外部视为背景.
/// 3. 孤立像素返回只含 `start` 的曲线.
pub fn moore_trace(mask: &MaskSlice, start: Idx2d) -> Vec<Idx2d> {
    let mut pts = vec![start];
    if !mask.is_foreground_at(start) {
        return vec![];
    }
    let (h, w) = mask.shape();
    let max_steps = 4 * h * w + 16;

    let mut cur = start;
    let mut dir = 7usize;
    let mut second: Option<Idx2d> = None;
    for _ in 0..max_steps {
        let Some((next, d)) = step(mask, cur, dir) else {
            // 孤立像素.
            return pts;
        };
        dir = d;
        match second {
            None => second = Some(next),
            Some(p1) if cur == start && next == p1 => {
                // 最后一次压入的是回到起点的 `start`.
                pts.pop();
                return pts;
            }
            Some(_) => {}
        }
        pts.push(next);
        cur = next;
    }
    log::warn!("boundary tracing did not close after {max_steps} steps");
    pts
}

/// 从方向 `dir` 到达 `cur` 之后, 寻找下一个边界像素. 返回像素及其方向码.
fn step(mask: &MaskSlice, (ch, cw): Idx2d, dir: usize) -> Option<(Idx2d, usize)> {
    let first = if dir % 2 == 0 { (dir + 7) % 8 } else { (dir + 6) % 8 };
    (0..8).map(|i| (first + i) % 8).find_map(|d| {
        let (dh, dw) = DIRS[d];
        let nh = ch as i64 + dh;
        let nw = cw as i64 + dw;
        if nh < 0 || nw < 0 {
            return None;
        }
        let n = (nh as usize, nw as usize);
        mask.is_foreground_at(n).then_some((n, d))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr2, Array2};

    #[test]
    fn test_trace_square() {
        let mut a = Array2::<u8>::zeros((5, 5));
        for h in 1..4 {
            for w in 1..4 {
                a[(h, w)] = 1;
            }
        }
        let m = MaskSlice::new(a.view());
        let b = moore_trace(&m, (1, 1));
        assert_eq!(
            b,
            vec![(1, 1), (2, 1), (3, 1), (3, 2), (3, 3), (2, 3), (1, 3), (1, 2)]
        );
    }

    #[test]
    fn test_trace_touching_border() {
        let a = arr2(&[[1u8, 1], [1, 1]]);
        let m = MaskSlice::new(a.view());
        assert_eq!(moore_trace(&m, (0, 0)), vec![(0, 0), (1, 0), (1, 1), (0, 1)]);
    }

    #[test]
    fn test_trace_degenerate() {
        let a = arr2(&[[0u8, 0, 0], [0, 1, 0], [0, 0, 0]]);
        let m = MaskSlice::new(a.view());
        assert_eq!(moore_trace(&m, (1, 1)), vec![(1, 1)]);
        assert!(moore_trace(&m, (0, 0)).is_empty());

        // 一条水平线: 来回走一遍.
        let a = arr2(&[[1u8, 1, 1]]);
        let m = MaskSlice::new(a.view());
        assert_eq!(moore_trace(&m, (0, 0)), vec![(0, 0), (0, 1), (0, 2), (0, 1)]);
    }

    #[test]
    fn test_trace_is_8_connected_and_closed() {
        let a = arr2(&[
            [0u8, 0, 1, 0, 0],
            [0, 1, 1, 1, 0],
            [1, 1, 1, 1, 1],
            [0, 1, 0, 1, 0],
        ]);
        let m = MaskSlice::new(a.view());
        let b = moore_trace(&m, (0, 2));
        assert!(b.len() >= 8);
        let adjacent = |p: Idx2d, q: Idx2d| p.0.abs_diff(q.0) <= 1 && p.1.abs_diff(q.1) <= 1 && p != q;
        for pair in b.windows(2) {
            assert!(adjacent(pair[0], pair[1]));
        }
        assert!(adjacent(b[b.len() - 1], b[0]));
        assert!(b.iter().all(|p| m.is_foreground_at(*p)));
    }
}
