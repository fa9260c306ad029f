//! 配置模块，负责加载JSON价格表
//!
//! 演示/测试场景下的价格来源：真实插件运行时由游戏客户端提供价格查询，
//! 这里用一张静态的 物品id → 单价 表顶替同一接口。

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::rule::EvalContext;

/// 价格表配置错误
#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "配置错误: {}", self.message)
    }
}

impl std::error::Error for ConfigError {}

impl ConfigError {
    pub fn new(message: String) -> Self {
        Self { message }
    }
}

/// 静态价格表，物品id到单价的映射
#[derive(Debug, Clone)]
pub struct PriceTable {
    prices: HashMap<i64, i64>,
}

impl PriceTable {
    /// 从JSON文件加载价格表，文件形如 `{"995": 1, "4151": 1800000}`
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();

        // 检查文件是否存在
        if !path_ref.exists() {
            return Err(ConfigError::new(format!(
                "配置文件不存在: {}",
                path_ref.display()
            )));
        }

        // 读取文件内容
        let content = fs::read_to_string(path_ref).map_err(|e| {
            ConfigError::new(format!("无法读取配置文件 {}: {}", path_ref.display(), e))
        })?;

        // 解析JSON，JSON对象的键是字符串，这里转回物品id
        let raw: HashMap<String, i64> = serde_json::from_str(&content).map_err(|e| {
            ConfigError::new(format!("无法解析JSON配置文件 {}: {}", path_ref.display(), e))
        })?;

        let mut prices = HashMap::with_capacity(raw.len());
        for (key, price) in raw {
            let id = key.parse::<i64>().map_err(|_| {
                ConfigError::new(format!("非法的物品id键 '{}'", key))
            })?;
            prices.insert(id, price);
        }

        Ok(PriceTable { prices })
    }

    /// 获取物品单价，查不到返回None，由求值侧按不匹配处理
    pub fn price(&self, id: i64) -> Option<i64> {
        self.prices.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    /// 创建默认价格表（用于测试或fallback）
    pub fn default() -> Self {
        let mut prices = HashMap::new();
        prices.insert(995, 1); // Coins
        prices.insert(526, 111); // Bones
        prices.insert(4151, 1_800_000); // Abyssal whip
        prices.insert(11840, 180_000); // Dragon boots
        prices.insert(1515, 480); // Yew logs

        Self { prices }
    }
}

impl EvalContext for PriceTable {
    fn item_price(&self, id: i64) -> Option<i64> {
        self.price(id)
    }
}
