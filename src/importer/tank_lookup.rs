// ==========================================
// 加药管理系统 - 储槽名称比对
// ==========================================
// 表格中的储槽以名称出现，比对顺序:
// 1. 名称完全相同  2. 储槽 ID  3. 去空白、不分大小写后相同
// ==========================================

use crate::domain::tank::Tank;
use crate::domain::types::SystemCategory;
use std::collections::HashMap;

fn loose_key(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

/// 区域代码整段出现: 前面不得紧接 ASCII 字母数字，后面不得紧接数字（ct1 不命中 ct12 / act1）
fn contains_area_code(text: &str, code: &str) -> bool {
    let key = loose_key(text);
    key.match_indices(code).any(|(idx, _)| {
        let before = key[..idx].chars().next_back();
        let after = key[idx + code.len()..].chars().next();
        !before.map_or(false, |c| c.is_ascii_alphanumeric())
            && !after.map_or(false, |c| c.is_ascii_digit())
    })
}

pub struct TankLookup<'a> {
    tanks: &'a [Tank],
    by_name: HashMap<&'a str, &'a Tank>,
    by_id: HashMap<&'a str, &'a Tank>,
    by_loose: HashMap<String, &'a Tank>,
}

impl<'a> TankLookup<'a> {
    pub fn new(tanks: &'a [Tank]) -> Self {
        let mut by_name = HashMap::new();
        let mut by_id = HashMap::new();
        let mut by_loose = HashMap::new();
        for tank in tanks {
            by_name.entry(tank.name.trim()).or_insert(tank);
            by_id.entry(tank.id.as_str()).or_insert(tank);
            by_loose.entry(loose_key(&tank.name)).or_insert(tank);
        }
        Self {
            tanks,
            by_name,
            by_id,
            by_loose,
        }
    }

    pub fn find(&self, name: &str) -> Option<&'a Tank> {
        let name = name.trim();
        self.by_name
            .get(name)
            .or_else(|| self.by_id.get(name))
            .copied()
            .or_else(|| self.by_loose.get(&loose_key(name)).copied())
    }

    /// 冷却水区域（CT-1 / CT-2）内的全部冷却水储槽
    ///
    /// 名称或说明中整段包含区域代码（忽略连字符与空白）者视为该区域储槽
    pub fn cooling_area(&self, area: &str) -> Vec<&'a Tank> {
        let code = loose_key(area);
        if code.is_empty() {
            return Vec::new();
        }
        self.tanks
            .iter()
            .filter(|t| t.system == SystemCategory::Cooling)
            .filter(|t| {
                contains_area_code(&t.name, &code)
                    || t.description.as_deref().map_or(false, |d| contains_area_code(d, &code))
            })
            .collect()
    }
}
