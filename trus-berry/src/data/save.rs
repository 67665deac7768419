//! 图像的持久化存储.

use std::path::Path;

use image::ImageResult;
use ndarray::ArrayView2;

use crate::consts::gray::*;
use crate::data::MaskSlice;

/// 表明一个可以通过 **可视化友好** 模式持久化存储的图像对象.
///
/// 对于 [`MaskSlice`] 这类仅存在 0, 1 像素值的掩膜, 在保存时会映射为黑/白.
pub trait ImgWriteVis {
    /// 按照一定的可视化规则将图片保存到 `path` 路径.
    fn save<P: AsRef<Path>>(&self, path: P) -> ImageResult<()>;
}

/// 使掩膜像素更有利于单通道可视化. 非 0 像素都映射为白色.
#[inline]
pub(crate) fn pretty(label: u8) -> u8 {
    if is_background(label) {
        BLACK
    } else {
        WHITE
    }
}

fn write_gray<P: AsRef<Path>>(
    view: ArrayView2<u8>,
    path: P,
    map: impl Fn(u8) -> u8,
) -> ImageResult<()> {
    let (height, width) = view.dim();
    let mut buf = image::GrayImage::new(width as u32, height as u32);
    for ((h, w), &pix) in view.indexed_iter() {
        buf.put_pixel(w as u32, h as u32, image::Luma([map(pix)]));
    }
    buf.save(path)
}

/// 背景为黑色, 前景为白色.
impl ImgWriteVis for MaskSlice<'_> {
    fn save<P: AsRef<Path>>(&self, path: P) -> ImageResult<()> {
        write_gray(self.array_view(), path, pretty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn test_save_mask() {
        let dir = tempfile::tempdir().unwrap();
        let a = arr2(&[[0u8, 1, 1], [1, 0, 0]]);

        let vis = dir.path().join("mask.png");
        MaskSlice::new(a.view()).save(&vis).unwrap();
        let img = image::open(&vis).unwrap().to_luma8();
        assert_eq!(img.dimensions(), (3, 2));
        assert_eq!(img.get_pixel(1, 0).0, [WHITE]);
        assert_eq!(img.get_pixel(0, 0).0, [BLACK]);
    }
}
