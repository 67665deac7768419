//! 离线评估: 遍历试验结果目录, 对每个试验的重建网格与病例真值网格计算指标,
//! 并追加到各参与者的 `metrics.csv`.

mod result;
mod runner;

fn main() {
    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .init()
        .expect("Logger initialization error");

    runner::run().analyze();
}
