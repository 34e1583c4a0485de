/// Divides a PICTURE pool evenly across the clients competing for it.
///
/// The share is advisory: nothing is debited from the pool. Clients meter
/// against it locally until the next heartbeat publishes a fresh one.
pub struct FairShareAllocator;

impl FairShareAllocator {
    /// `min(client_max_limit, total / competing_clients)`, with no division
    /// when nobody competes.
    pub fn share(total: u32, competing_clients: usize, client_max_limit: u32) -> u32 {
        let even = if competing_clients == 0 {
            total
        } else {
            (u64::from(total) / competing_clients as u64) as u32
        };
        even.min(client_max_limit)
    }
}
