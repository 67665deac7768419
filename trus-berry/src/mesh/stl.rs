//! STL 读写. 写出总是使用二进制格式; 读入同时支持二进制和 ASCII 格式.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::{TrialError, TrialResult};
use crate::mesh::TriMesh;
use crate::Point3;

/// 二进制 STL 的文件头长度.
const HEADER_LEN: usize = 80;

/// 每个三角形 50 字节: 法向 12 + 顶点 36 + 属性 2.
const FACET_LEN: usize = 50;

/// 序列化为二进制 STL.
pub(crate) fn to_binary_stl_bytes(mesh: &TriMesh, header_name: &str) -> Vec<u8> {
    let n = mesh.triangles().len();
    let mut out = Vec::with_capacity(HEADER_LEN + 4 + n * FACET_LEN);

    let mut header = [0u8; HEADER_LEN];
    let name_bytes = header_name.as_bytes();
    let copy_n = name_bytes.len().min(header.len());
    header[..copy_n].copy_from_slice(&name_bytes[..copy_n]);
    out.extend_from_slice(&header);
    out.extend_from_slice(&(n as u32).to_le_bytes());

    for (i, normal) in mesh.face_normals().iter().enumerate() {
        for v in normal {
            out.extend_from_slice(&(*v as f32).to_le_bytes());
        }
        for corner in mesh.corners(i) {
            for v in corner {
                out.extend_from_slice(&(v as f32).to_le_bytes());
            }
        }
        out.extend_from_slice(&0u16.to_le_bytes());
    }
    out
}

/// 把网格写为二进制 STL.
pub fn write_stl<P: AsRef<Path>>(path: P, mesh: &TriMesh) -> TrialResult<()> {
    fs::write(path, to_binary_stl_bytes(mesh, "trus-berry"))?;
    Ok(())
}

/// 读入 STL 文件 (二进制或 ASCII). 坐标完全相同的顶点会被合并.
pub fn read_stl<P: AsRef<Path>>(path: P) -> TrialResult<TriMesh> {
    let data = fs::read(path.as_ref())?;
    let malformed = |reason: &str| TrialError::Malformed {
        path: path.as_ref().display().to_string(),
        reason: reason.to_string(),
    };
    let soup = if is_ascii_stl(&data) {
        parse_ascii(&data).map_err(malformed)?
    } else {
        parse_binary(&data).map_err(malformed)?
    };
    Ok(weld(&soup))
}

fn is_ascii_stl(data: &[u8]) -> bool {
    // 二进制文件头也可能以 "solid" 开头, 需要再找 "facet".
    if !data.starts_with(b"solid") {
        return false;
    }
    let check_len = data.len().min(1024);
    data[..check_len].windows(5).any(|w| w == b"facet")
}

fn parse_binary(data: &[u8]) -> Result<Vec<[Point3; 3]>, &'static str> {
    if data.len() < HEADER_LEN + 4 {
        return Err("binary STL too short");
    }
    let count = u32::from_le_bytes([data[80], data[81], data[82], data[83]]) as usize;
    if data.len() < HEADER_LEN + 4 + count * FACET_LEN {
        return Err("binary STL truncated");
    }

    let read_f32 = |at: usize| f32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]]);
    let mut soup = Vec::with_capacity(count);
    for t in 0..count {
        // 跳过法向.
        let base = HEADER_LEN + 4 + t * FACET_LEN + 12;
        let mut tri = [[0.0; 3]; 3];
        for (k, corner) in tri.iter_mut().enumerate() {
            for (c, v) in corner.iter_mut().enumerate() {
                *v = read_f32(base + (k * 3 + c) * 4) as f64;
            }
        }
        soup.push(tri);
    }
    Ok(soup)
}

fn parse_ascii(data: &[u8]) -> Result<Vec<[Point3; 3]>, &'static str> {
    let text = std::str::from_utf8(data).map_err(|_| "invalid UTF-8 in ASCII STL")?;
    let mut soup = Vec::new();
    let mut current: Vec<Point3> = Vec::with_capacity(3);

    for line in text.lines() {
        let mut parts = line.split_whitespace();
        if parts.next() != Some("vertex") {
            continue;
        }
        let mut p = [0.0; 3];
        for v in p.iter_mut() {
            *v = parts
                .next()
                .and_then(|s| s.parse::<f64>().ok())
                .ok_or("bad vertex line in ASCII STL")?;
        }
        current.push(p);
        if current.len() == 3 {
            soup.push([current[0], current[1], current[2]]);
            current.clear();
        }
    }
    if !current.is_empty() {
        return Err("dangling vertices in ASCII STL");
    }
    Ok(soup)
}

/// 合并坐标逐位相同的顶点, 恢复三角形之间的连接关系.
fn weld(soup: &[[Point3; 3]]) -> TriMesh {
    let mut index: HashMap<[u64; 3], usize> = HashMap::with_capacity(soup.len());
    let mut vertices = Vec::with_capacity(soup.len() / 2 + 3);
    let triangles = soup
        .iter()
        .map(|tri| {
            tri.map(|p| {
                // +0.0 与 -0.0 视为同一点.
                let key = p.map(|v| (v + 0.0).to_bits());
                *index.entry(key).or_insert_with(|| {
                    vertices.push(p);
                    vertices.len() - 1
                })
            })
        })
        .collect();
    TriMesh::new(vertices, triangles)
}
