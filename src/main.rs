use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing_subscriber::EnvFilter;

use loot_filters::config::PriceTable;
use loot_filters::engine::{self, FilterStore};
use loot_filters::filter::FilterConfig;
use loot_filters::lexer::Lexer;
use loot_filters::parser::Parser;
use loot_filters::rule::ItemSnapshot;

const DEMO_FILTER: &str = r##"// 示例过滤器
#define VALUABLE 100_000

apply {
    meta { name: "高价值掉落", tier = "S" }
    if (value >= VALUABLE) { color: "#FFD700"; text: "高价值!"; }
};

apply {
    if (id == [4151] || name == ["Dragon boots"]) { highlight: "#00FF00"; }
};

apply {
    if (quantity >= 1000 && !(id == [995])) { color: "#00FFFF"; }
    if (value >= 1_000) { color: "#FF8800"; }
};

// 其余一律隐藏
apply { hidden: true; };
"##;

/// 加载价格表，优先使用JSON配置，失败时使用内置默认表
fn load_price_table() -> PriceTable {
    match PriceTable::from_json_file("prices.json") {
        Ok(table) => {
            println!("✅ 成功从JSON配置文件加载价格表，共 {} 项", table.len());
            table
        }
        Err(e) => {
            println!("⚠️ 无法加载JSON配置文件 ({}), 使用默认价格表", e);
            PriceTable::default()
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("--- Loot Filters: 拾取过滤器DSL ---");
    println!("\n[输入 DSL]:\n{}", DEMO_FILTER);

    // 1. 词法分析器 - 对 DSL 进行分词
    println!("[步骤 1]: 对 DSL 进行分词...");
    let tokens = Lexer::new(DEMO_FILTER)
        .tokenize()
        .map_err(|e| anyhow::anyhow!("分词失败: {e}"))?;
    println!("生成了 {} 个 token", tokens.len());

    // 2. 语法分析器 - 预处理替换并编译为规则树
    println!("\n[步骤 2]: 解析并编译为规则树...");
    let filters = Parser::new(tokens)
        .parse()
        .map_err(|e| anyhow::anyhow!("解析失败: {e}"))?;
    println!("✓ 编译得到 {} 条过滤规则", filters.len());
    println!("\n[持久化形式]:\n{}", FilterConfig::to_json(&filters)?);

    // 3. 整体编译成功后一次性发布，读取方永远看不到半成品
    let store = FilterStore::new();
    store.publish(filters);
    let prices = load_price_table();

    println!("\n[步骤 3]: 对示例物品求值...");
    let samples = [
        ItemSnapshot::new(4151, "Abyssal whip", 1),
        ItemSnapshot::new(11840, "Dragon boots", 1),
        ItemSnapshot::new(995, "Coins", 2500),
        ItemSnapshot::new(526, "Bones", 1),
    ];
    let active = store.snapshot();
    for item in &samples {
        match engine::evaluate(&active, &prices, item) {
            Some(display) => println!("✓ {} x{} 命中 -> {:?}", item.name, item.quantity, display),
            None => println!("✗ {} x{} 无命中", item.name, item.quantity),
        }
    }

    run_repl(&store, &prices)
}

/// 交互测试循环
fn run_repl(store: &FilterStore, prices: &PriceTable) -> Result<()> {
    println!("\n[交互模式]");
    println!("  <id> <数量> <名称>  测试一个物品");
    println!("  reload <文件路径>   重新加载过滤器源文件");
    println!("  quit                退出");

    let mut rl = DefaultEditor::new()?;
    loop {
        match rl.readline("item> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                rl.add_history_entry(line)?;

                if line == "quit" || line == "exit" {
                    break;
                }
                if let Some(path) = line.strip_prefix("reload ") {
                    reload_from_file(store, path.trim());
                    continue;
                }
                match parse_item(line) {
                    Some(item) => {
                        let active = store.snapshot();
                        match engine::evaluate(&active, prices, &item) {
                            Some(display) => println!("✓ 命中 -> {:?}", display),
                            None => println!("✗ 无命中"),
                        }
                    }
                    None => println!("格式: <id> <数量> <名称>"),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

fn reload_from_file(store: &FilterStore, path: &str) {
    match std::fs::read_to_string(path) {
        Ok(source) => match store.reload(&source) {
            Ok(count) => println!("✓ 重载成功，共 {} 条规则", count),
            // 编译失败时旧规则继续生效
            Err(e) => println!("✗ 编译失败: {}", e),
        },
        Err(e) => println!("✗ 读取失败 {}: {}", path, e),
    }
}

fn parse_item(line: &str) -> Option<ItemSnapshot> {
    let mut parts = line.splitn(3, char::is_whitespace);
    let id = parts.next()?.parse().ok()?;
    let quantity = parts.next()?.parse().ok()?;
    let name = parts.next().unwrap_or("").trim().to_string();
    Some(ItemSnapshot::new(id, name, quantity))
}
