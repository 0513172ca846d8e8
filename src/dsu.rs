//! Array-backed disjoint-set forest
//!
//! Path compression in `find`, union by rank in `unify`. Lives inside a
//! single process and a single sampling call; it is never shared between
//! ranks.

#[derive(Debug, Clone)]
pub struct DisjointSet {
    parent: Vec<u32>,
    rank: Vec<u8>,
}

impl DisjointSet {
    /// `len` singleton sets over `[0, len)`
    pub fn new(len: usize) -> Self {
        Self {
            parent: (0..len as u32).collect(),
            rank: vec![0; len],
        }
    }

    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// Representative of the set containing `x`
    pub fn find(&mut self, x: u32) -> u32 {
        let mut root = x;
        while self.parent[root as usize] != root {
            root = self.parent[root as usize];
        }

        let mut current = x;
        while self.parent[current as usize] != root {
            let next = self.parent[current as usize];
            self.parent[current as usize] = root;
            current = next;
        }
        root
    }

    /// Merge the sets of `a` and `b`; returns false if they were already one
    pub fn unify(&mut self, a: u32, b: u32) -> bool {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return false;
        }

        let (high, low) = if self.rank[ra as usize] >= self.rank[rb as usize] {
            (ra, rb)
        } else {
            (rb, ra)
        };
        self.parent[low as usize] = high;
        if self.rank[high as usize] == self.rank[low as usize] {
            self.rank[high as usize] += 1;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_singletons() {
        let mut dsu = DisjointSet::new(4);
        for v in 0..4 {
            assert_eq!(dsu.find(v), v);
        }
    }

    #[test]
    fn test_unify_reports_merges() {
        let mut dsu = DisjointSet::new(5);
        assert!(dsu.unify(0, 1));
        assert!(dsu.unify(3, 4));
        assert!(!dsu.unify(1, 0));
        assert!(dsu.unify(1, 4));

        let root = dsu.find(0);
        assert_eq!(dsu.find(3), root);
        assert_eq!(dsu.find(4), root);
        assert_ne!(dsu.find(2), root);
    }

    #[test]
    fn test_long_chain_is_compressed() {
        let n = 1000;
        let mut dsu = DisjointSet::new(n);
        for v in 1..n as u32 {
            dsu.unify(v - 1, v);
        }
        let root = dsu.find(n as u32 - 1);
        for v in 0..n as u32 {
            assert_eq!(dsu.find(v), root);
            assert_eq!(dsu.parent[v as usize], root);
        }
    }

    #[test]
    fn test_empty() {
        let dsu = DisjointSet::new(0);
        assert!(dsu.is_empty());
        assert_eq!(dsu.len(), 0);
    }
}
