use std::collections::HashMap;

use crate::error::{FrameError, FrameResult};
use crate::pose::Pose;

/// 非根坐标系节点: 父坐标系名称及 "本坐标系 → 父坐标系" 的位姿.
#[derive(Clone, Debug)]
struct FrameNode {
    parent: String,
    pose: Pose,
}

/// 由位姿连接的命名坐标系树.
///
/// 每个非根坐标系恰好有一个父位姿, 所有坐标系最终都能到达唯一的根坐标系.
/// 图中不存在环: [`FrameGraph::reparent`] 会拒绝一切成环的修改.
///
/// 坐标系图由会话持有, 以引用方式传递. 不存在全局注册表.
#[derive(Clone, Debug)]
pub struct FrameGraph {
    root: String,
    nodes: HashMap<String, FrameNode>,
}

impl FrameGraph {
    /// 创建只有根坐标系 `root` 的图.
    pub fn new(root: &str) -> Self {
        Self {
            root: root.to_string(),
            nodes: HashMap::new(),
        }
    }

    /// 根坐标系名称.
    #[inline]
    pub fn root(&self) -> &str {
        &self.root
    }

    /// 坐标系个数 (包括根).
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len() + 1
    }

    /// 图中是否只有根坐标系?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// 图中是否存在名为 `name` 的坐标系?
    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        name == self.root || self.nodes.contains_key(name)
    }

    /// 所有坐标系的名称, 按字典序排列. 根坐标系在最前.
    pub fn names(&self) -> Vec<&str> {
        let mut v: Vec<&str> = self.nodes.keys().map(String::as_str).collect();
        v.sort_unstable();
        v.insert(0, self.root.as_str());
        v
    }

    /// 在 `parent` 之下添加坐标系 `name`, `pose` 为 `name → parent`.
    pub fn add_frame(&mut self, name: &str, parent: &str, pose: Pose) -> FrameResult<()> {
        if self.contains(name) {
            return Err(FrameError::DuplicateFrame(name.to_string()));
        }
        if !self.contains(parent) {
            return Err(FrameError::UnknownFrame(parent.to_string()));
        }
        self.nodes.insert(
            name.to_string(),
            FrameNode {
                parent: parent.to_string(),
                pose,
            },
        );
        Ok(())
    }

    /// 整体替换 `name` 的父位姿.
    pub fn set_pose(&mut self, name: &str, pose: Pose) -> FrameResult<()> {
        self.node_mut(name)?.pose = pose;
        Ok(())
    }

    /// 获取 `name → parent` 的位姿. 根坐标系返回恒等变换.
    pub fn pose(&self, name: &str) -> FrameResult<Pose> {
        if name == self.root {
            return Ok(Pose::IDENTITY);
        }
        Ok(self.node(name)?.pose)
    }

    /// 获取父坐标系名称. 根坐标系返回 `None`.
    pub fn parent(&self, name: &str) -> FrameResult<Option<&str>> {
        if name == self.root {
            return Ok(None);
        }
        Ok(Some(self.node(name)?.parent.as_str()))
    }

    /// 把 `name` 挂到 `new_parent` 之下, 位姿保持不变.
    ///
    /// 如果 `new_parent` 是 `name` 自身或其后代, 返回 `Err(FrameError::Cycle)`.
    pub fn reparent(&mut self, name: &str, new_parent: &str) -> FrameResult<()> {
        if !self.contains(new_parent) {
            return Err(FrameError::UnknownFrame(new_parent.to_string()));
        }
        if name == self.root {
            return Err(FrameError::RootFrame(name.to_string()));
        }
        if !self.nodes.contains_key(name) {
            return Err(FrameError::UnknownFrame(name.to_string()));
        }
        if self.ancestors(new_parent)?.iter().any(|a| *a == name) {
            return Err(FrameError::Cycle {
                frame: name.to_string(),
                parent: new_parent.to_string(),
            });
        }
        self.node_mut(name)?.parent = new_parent.to_string();
        Ok(())
    }

    /// 删除叶坐标系 `name`, 返回它的父位姿.
    pub fn remove_frame(&mut self, name: &str) -> FrameResult<Pose> {
        if self.nodes.values().any(|n| n.parent == name) {
            return Err(FrameError::HasChildren(name.to_string()));
        }
        let err = self.missing_or_root(name);
        self.nodes.remove(name).map(|n| n.pose).ok_or(err)
    }

    /// 从 `name` 自身 (包括) 到根 (包括) 的路径.
    pub fn ancestors(&self, name: &str) -> FrameResult<Vec<&str>> {
        let mut ans = Vec::with_capacity(8);
        let mut cur = self.name_ref(name)?;
        loop {
            ans.push(cur);
            match self.nodes.get(cur) {
                Some(node) => cur = node.parent.as_str(),
                None => break,
            }
            debug_assert!(ans.len() <= self.len(), "frame graph contains a cycle");
        }
        Ok(ans)
    }

    /// 获取 `name → root` 的变换, 即沿父链依次组合所有父位姿.
    pub fn world_transform(&self, name: &str) -> FrameResult<Pose> {
        let path = self.ancestors(name)?;
        // path = [name, parent, ..., root]; 世界变换 = P_k · ... · P_1 · P_name.
        let mut ans = Pose::IDENTITY;
        for frame in path.iter().rev() {
            if let Some(node) = self.nodes.get(*frame) {
                ans = ans * node.pose;
            }
        }
        Ok(ans)
    }

    /// 获取 `from → to` 的变换: `world(to)⁻¹ · world(from)`.
    pub fn transform_between(&self, from: &str, to: &str) -> FrameResult<Pose> {
        let from_world = self.world_transform(from)?;
        let to_world = self.world_transform(to)?;
        let inv = to_world
            .inverse()
            .ok_or_else(|| FrameError::Singular(to.to_string()))?;
        Ok(inv * from_world)
    }

    #[inline]
    fn node(&self, name: &str) -> FrameResult<&FrameNode> {
        self.nodes
            .get(name)
            .ok_or_else(|| self.missing_or_root(name))
    }

    #[inline]
    fn node_mut(&mut self, name: &str) -> FrameResult<&mut FrameNode> {
        let err = self.missing_or_root(name);
        self.nodes.get_mut(name).ok_or(err)
    }

    fn missing_or_root(&self, name: &str) -> FrameError {
        if name == self.root {
            FrameError::RootFrame(name.to_string())
        } else {
            FrameError::UnknownFrame(name.to_string())
        }
    }

    /// 把 `name` 转换为图内部持有的引用.
    fn name_ref(&self, name: &str) -> FrameResult<&str> {
        if name == self.root {
            return Ok(self.root.as_str());
        }
        self.nodes
            .get_key_value(name)
            .map(|(k, _)| k.as_str())
            .ok_or_else(|| FrameError::UnknownFrame(name.to_string()))
    }
}
