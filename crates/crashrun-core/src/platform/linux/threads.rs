//! Thread bookkeeping for a traced process.
//!
//! Every thread gets a number in discovery order, starting at 1 for the
//! main thread. Numbers are never reused.
//!
//! A new thread first reports a `SIGSTOP` stop. That stop and the parent's
//! `PTRACE_EVENT_CLONE` can arrive in either order, so both sides are
//! tracked until they meet.

use std::collections::{BTreeMap, HashSet};

use nix::unistd::Pid;

#[derive(Debug, Default)]
pub(crate) struct ThreadList
{
    numbers: BTreeMap<Pid, usize>,
    next_number: usize,
    /// Threads owing us a `SIGSTOP` stop that must not be reported.
    expect_sigstop: HashSet<Pid>,
    /// Threads whose first stop came before the clone event announcing them.
    early: HashSet<Pid>,
}

impl ThreadList
{
    pub(crate) fn new(leader: Pid) -> Self
    {
        let mut threads = Self {
            next_number: 1,
            ..Self::default()
        };
        threads.add(leader);
        threads
    }

    fn add(&mut self, tid: Pid)
    {
        if !self.numbers.contains_key(&tid) {
            self.numbers.insert(tid, self.next_number);
            self.next_number += 1;
        }
    }

    pub(crate) fn contains(&self, tid: Pid) -> bool
    {
        self.numbers.contains_key(&tid)
    }

    pub(crate) fn remove(&mut self, tid: Pid)
    {
        self.numbers.remove(&tid);
        self.expect_sigstop.remove(&tid);
        self.early.remove(&tid);
    }

    /// Keep only `tid`; used after `execve` replaced every other thread.
    pub(crate) fn retain_only(&mut self, tid: Pid)
    {
        self.numbers.retain(|thread, _| *thread == tid);
        self.expect_sigstop.clear();
        self.early.clear();
        self.add(tid);
    }

    /// A `PTRACE_EVENT_CLONE` announced `tid`.
    pub(crate) fn announced(&mut self, tid: Pid)
    {
        if self.early.remove(&tid) {
            return;
        }
        self.add(tid);
        self.expect_sigstop.insert(tid);
    }

    /// `tid` stopped with `SIGSTOP`. Returns `true` if that stop is ours to swallow.
    pub(crate) fn absorb_sigstop(&mut self, tid: Pid) -> bool
    {
        if self.expect_sigstop.remove(&tid) {
            return true;
        }
        if !self.contains(tid) {
            self.add(tid);
            self.early.insert(tid);
            return true;
        }
        false
    }

    /// A stop we caused is still queued for `tid`.
    pub(crate) fn expect_stop(&mut self, tid: Pid)
    {
        self.expect_sigstop.insert(tid);
    }

    /// All threads with their numbers, highest number first.
    pub(crate) fn by_number_desc(&self) -> Vec<(Pid, usize)>
    {
        let mut threads: Vec<(Pid, usize)> = self.numbers.iter().map(|(tid, n)| (*tid, *n)).collect();
        threads.sort_by(|a, b| b.1.cmp(&a.1));
        threads
    }

    pub(crate) fn tids(&self) -> Vec<Pid>
    {
        self.numbers.keys().copied().collect()
    }
}
