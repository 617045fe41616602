use simulation::simulate_workspace;
pub mod simulation;

fn main() {
    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async_main());
}

async fn async_main() {
    println!("Tabsync convergence simulation");
    println!("==============================");

    // Small scale: a couple of tabs on one desk.
    let stats = simulate_workspace(2, 5, 3).await;
    stats.print();
    assert!(stats.converged(), "2-browser run diverged");

    // Medium scale: a site crew's worth of sessions.
    let stats = simulate_workspace(5, 10, 4).await;
    stats.print();
    assert!(stats.converged(), "5-browser run diverged");

    // Larger burst of concurrent edits.
    let stats = simulate_workspace(8, 20, 5).await;
    stats.print();
    assert!(stats.converged(), "8-browser run diverged");

    println!("\nAll runs converged.");
}
