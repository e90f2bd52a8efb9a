//! Placement search: the three policies that pick a reusable free block.

use std::ptr::NonNull;

use crate::config::Policy;
use crate::header::BlockHeader;
use crate::list::GlobalList;

/// Scans `list` for a free block able to hold `target` bytes (including
/// its own header), per `policy`. Returns `None` on a miss.
pub(crate) fn find(list: &GlobalList, target: usize, policy: Policy) -> Option<NonNull<BlockHeader>> {
    match policy {
        Policy::FirstFit => first_fit(list, target),
        Policy::BestFit => best_fit(list, target),
        Policy::WorstFit => worst_fit(list, target),
    }
}

fn candidates(list: &GlobalList, target: usize) -> impl Iterator<Item = NonNull<BlockHeader>> + '_ {
    list.iter().filter(move |&block| unsafe {
        BlockHeader::is_free(block) && BlockHeader::size(block) >= target
    })
}

fn first_fit(list: &GlobalList, target: usize) -> Option<NonNull<BlockHeader>> {
    candidates(list, target).next()
}

fn best_fit(list: &GlobalList, target: usize) -> Option<NonNull<BlockHeader>> {
    let mut best: Option<(NonNull<BlockHeader>, usize)> = None;
    for block in candidates(list, target) {
        let slack = unsafe { BlockHeader::size(block) } - target;
        match best {
            Some((_, best_slack)) if slack >= best_slack => {}
            _ => best = Some((block, slack)),
        }
    }
    best.map(|(block, _)| block)
}

fn worst_fit(list: &GlobalList, target: usize) -> Option<NonNull<BlockHeader>> {
    let mut worst: Option<(NonNull<BlockHeader>, usize)> = None;
    for block in candidates(list, target) {
        let slack = unsafe { BlockHeader::size(block) } - target;
        match worst {
            Some((_, worst_slack)) if slack <= worst_slack => {}
            _ => worst = Some((block, slack)),
        }
    }
    worst.map(|(block, _)| block)
}
