//! 分割模型接口.
//!
//! 模型本身 (结构, 权重, 推理后端) 不属于本 crate. 任何能把 `256 x 256`
//! 的标准化图像映射为同尺寸前景概率图的对象都可以作为模型接入流水线.

use ndarray::{Array2, ArrayView2};

use crate::error::OracleError;
use crate::Idx2d;

/// 黑盒分割模型.
pub trait SegmentationOracle {
    /// 对标准化后的输入求前景概率图. 输出形状必须与输入相同.
    fn predict(&mut self, input: ArrayView2<f32>) -> Result<Array2<f32>, OracleError>;
}

impl<F> SegmentationOracle for F
where
    F: FnMut(ArrayView2<f32>) -> Result<Array2<f32>, OracleError>,
{
    #[inline]
    fn predict(&mut self, input: ArrayView2<f32>) -> Result<Array2<f32>, OracleError> {
        self(input)
    }
}

/// 以固定阈值分割的参考模型: 标准化强度高于 `level` 的像素概率为 1, 否则为 0.
///
/// 仅用于测试和无模型时的演示.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ThresholdOracle {
    level: f32,
}

impl ThresholdOracle {
    /// 以 `level` 为阈值.
    #[inline]
    pub fn new(level: f32) -> Self {
        Self { level }
    }
}

impl SegmentationOracle for ThresholdOracle {
    fn predict(&mut self, input: ArrayView2<f32>) -> Result<Array2<f32>, OracleError> {
        Ok(input.mapv(|v| if v > self.level { 1.0 } else { 0.0 }))
    }
}

/// 检查输入形状, 调用模型, 再检查输出形状.
pub fn run_oracle<O: SegmentationOracle + ?Sized>(
    oracle: &mut O,
    input: ArrayView2<f32>,
    expected: Idx2d,
) -> Result<Array2<f32>, OracleError> {
    if input.dim() != expected {
        return Err(OracleError::ShapeMismatch {
            expected,
            found: input.dim(),
        });
    }
    let out = oracle.predict(input)?;
    if out.dim() != expected {
        return Err(OracleError::ShapeMismatch {
            expected,
            found: out.dim(),
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_oracle() {
        let input = ndarray::arr2(&[[-1.0f32, 0.5], [2.0, 0.0]]);
        let mut o = ThresholdOracle::new(0.25);
        let out = run_oracle(&mut o, input.view(), (2, 2)).unwrap();
        assert_eq!(out, ndarray::arr2(&[[0.0, 1.0], [1.0, 0.0]]));
    }

    #[test]
    fn test_shape_mismatch() {
        let input = Array2::<f32>::zeros((2, 3));
        let mut o = ThresholdOracle::new(0.0);
        assert_eq!(
            run_oracle(&mut o, input.view(), (2, 2)).unwrap_err(),
            OracleError::ShapeMismatch {
                expected: (2, 2),
                found: (2, 3)
            }
        );

        let square = Array2::<f32>::zeros((2, 2));
        fn shrink(_: ArrayView2<f32>) -> Result<Array2<f32>, OracleError> {
            Ok(Array2::zeros((1, 1)))
        }
        let mut shrinking = shrink;
        assert!(matches!(
            run_oracle(&mut shrinking, square.view(), (2, 2)),
            Err(OracleError::ShapeMismatch { found: (1, 1), .. })
        ));
    }
}
