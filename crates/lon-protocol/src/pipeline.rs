//! The generic bounded-queue pipeline shared by the send and receive
//! directions (§4.3): "Each stage has a bounded input and output queue; a
//! stage dequeues one unit of work per pump iteration if downstream has
//! room, otherwise waits." One [`Pipeline`] models either the five-stage
//! send path (App→Session→Transport→Auth→Network→Link) or its mirror
//! image on receive; the five named layers are just queue index 0..5.

use lon_rt::queue::BoundedQueue;

pub struct Pipeline<T> {
    queues: Vec<BoundedQueue<T>>,
}

impl<T> Pipeline<T> {
    /// `capacities.len()` queues, i.e. `capacities.len() - 1` stages
    /// between them.
    pub fn new(capacities: &[usize]) -> Self {
        Self {
            queues: capacities.iter().map(|&c| BoundedQueue::new(c)).collect(),
        }
    }

    pub fn num_stages(&self) -> usize {
        self.queues.len().saturating_sub(1)
    }

    pub fn push_input(&mut self, item: T) -> Result<(), T> {
        self.queues[0].push(item)
    }

    pub fn pop_output(&mut self) -> Option<T> {
        self.queues.last_mut().expect("pipeline has no queues").pop()
    }

    pub fn stage_queue_depth(&self, stage: usize) -> usize {
        self.queues[stage].len()
    }

    /// Advance stage `i` (the hop from queue `i` to queue `i+1`) one unit,
    /// only if the downstream queue has room. `f` may drop the unit (it
    /// returns `None`) — used by the network layer to drop a superseded
    /// send before it reaches the link.
    pub fn pump_stage<F>(&mut self, i: usize, f: F)
    where
        F: FnOnce(T) -> Option<T>,
    {
        if self.queues[i + 1].is_full() {
            return;
        }
        if let Some(item) = self.queues[i].pop() {
            if let Some(out) = f(item) {
                let _ = self.queues[i + 1].push(out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_advances_one_stage_per_pump() {
        let mut p: Pipeline<u32> = Pipeline::new(&[1, 1, 1]);
        p.push_input(7).unwrap();
        assert_eq!(p.stage_queue_depth(0), 1);
        p.pump_stage(0, |x| Some(x));
        assert_eq!(p.stage_queue_depth(0), 0);
        assert_eq!(p.stage_queue_depth(1), 1);
        p.pump_stage(1, |x| Some(x));
        assert_eq!(p.pop_output(), Some(7));
    }

    #[test]
    fn full_downstream_queue_blocks_the_stage() {
        let mut p: Pipeline<u32> = Pipeline::new(&[2, 1]);
        p.push_input(1).unwrap();
        p.push_input(2).unwrap();
        p.pump_stage(0, |x| Some(x));
        assert_eq!(p.stage_queue_depth(1), 1);
        // Downstream queue is full (capacity 1); the second item waits.
        p.pump_stage(0, |x| Some(x));
        assert_eq!(p.stage_queue_depth(0), 1);
        assert_eq!(p.stage_queue_depth(1), 1);
    }

    #[test]
    fn dropping_a_unit_frees_the_upstream_slot_without_advancing() {
        let mut p: Pipeline<u32> = Pipeline::new(&[1, 1]);
        p.push_input(9).unwrap();
        p.pump_stage(0, |_| None);
        assert_eq!(p.stage_queue_depth(0), 0);
        assert_eq!(p.stage_queue_depth(1), 0);
    }
}
